//! OS signal handling. Signals only flip the shutdown token; the session
//! loop notices it at the next frame boundary.

use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tuner_core::ShutdownToken;

/// Spawns a thread that triggers `token` on SIGINT, SIGTERM or SIGHUP
/// (Ctrl-C on non-Unix platforms).
pub fn spawn_signal_listener(token: ShutdownToken) -> Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;

    let handle = thread::Builder::new()
        .name("signal-listener".into())
        .spawn(move || {
            runtime.block_on(async move {
                match wait_for_signal().await {
                    Ok(name) => log::info!("Received {name}, stopping after the current frame"),
                    Err(err) => {
                        log::error!("Signal listener failed: {err}");
                        return;
                    }
                }
                token.trigger();
            });
        })
        .context("failed to spawn signal listener")?;
    Ok(handle)
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}
