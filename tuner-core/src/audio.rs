//! # Audio Capture Module
//!
//! Blocking frame source for the session loop. The cpal implementation
//! streams callback data across a crossbeam channel and hands it out in
//! fixed-size frames.
//!
//! ## Features
//! - `AudioSource` trait so the session loop can run on scripted input
//! - Default input device, mono f32 at the requested sample rate
//! - Device errors surface on the next `read`

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::error::AudioError;

/// Number of callback buffers that may queue before new ones are dropped.
const CHANNEL_CAPACITY: usize = 256;

/// A source of mono f32 frames at a fixed sample rate.
pub trait AudioSource {
    fn sample_rate(&self) -> u32;

    /// Begins delivering audio. Anything captured before this call is
    /// discarded, so the first `read` only sees samples from after it.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Fills `frame` completely, blocking until enough samples arrived.
    fn read(&mut self, frame: &mut [f32]) -> Result<(), AudioError>;

    /// Stops capture. Further reads fail.
    fn stop(&mut self) -> Result<(), AudioError>;
}

/// Device error reported by the stream callback, shared with the reader.
type FailureSlot = Arc<Mutex<Option<String>>>;

fn take_failure(slot: &FailureSlot) -> Option<String> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Callback half of the capture channel.
struct CaptureFeed {
    sender: Sender<Vec<f32>>,
    failure: FailureSlot,
    dropped: Arc<AtomicUsize>,
}

impl CaptureFeed {
    fn push_samples(&self, samples: Vec<f32>) {
        // a full channel means the reader fell behind; the reader logs the count
        if self.sender.try_send(samples).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn push_error(&self, reason: String) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
        // wake a blocked reader; if the channel is full it wakes on queued data
        let _ = self.sender.try_send(Vec::new());
    }
}

/// Reader half: reassembles callback buffers into fixed-size frames.
struct CaptureReader {
    receiver: Receiver<Vec<f32>>,
    pending: VecDeque<f32>,
    failure: FailureSlot,
    dropped: Arc<AtomicUsize>,
    reported_drops: usize,
}

fn capture_channel(capacity: usize) -> (CaptureFeed, CaptureReader) {
    let (sender, receiver) = crossbeam_channel::bounded(capacity);
    let failure = FailureSlot::default();
    let dropped = Arc::new(AtomicUsize::new(0));
    let feed = CaptureFeed {
        sender,
        failure: Arc::clone(&failure),
        dropped: Arc::clone(&dropped),
    };
    let reader = CaptureReader {
        receiver,
        pending: VecDeque::new(),
        failure,
        dropped,
        reported_drops: 0,
    };
    (feed, reader)
}

impl CaptureReader {
    fn check_failure(&self) -> Result<(), AudioError> {
        match take_failure(&self.failure) {
            Some(reason) => Err(AudioError::StreamFailure { reason }),
            None => Ok(()),
        }
    }

    fn report_drops(&mut self) {
        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > self.reported_drops {
            log::warn!(
                "Dropped {} input buffers, analysis is falling behind capture",
                dropped - self.reported_drops
            );
            self.reported_drops = dropped;
        }
    }

    /// Throws away everything captured so far.
    fn discard(&mut self) -> Result<(), AudioError> {
        let mut stale = self.pending.len();
        self.pending.clear();
        loop {
            match self.receiver.try_recv() {
                Ok(samples) => stale += samples.len(),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(AudioError::Disconnected),
            }
        }
        self.reported_drops = self.dropped.load(Ordering::Relaxed);
        if stale > 0 {
            log::debug!("Discarded {stale} samples captured before start");
        }
        self.check_failure()
    }

    fn read(&mut self, frame: &mut [f32]) -> Result<(), AudioError> {
        while self.pending.len() < frame.len() {
            self.check_failure()?;
            match self.receiver.recv() {
                Ok(samples) => self.pending.extend(samples),
                Err(_) => return Err(AudioError::Disconnected),
            }
        }
        self.check_failure()?;
        self.report_drops();

        let len = frame.len();
        for (slot, sample) in frame.iter_mut().zip(self.pending.drain(..len)) {
            *slot = sample;
        }
        Ok(())
    }
}

/// Captures from the default input device.
pub struct CpalSource {
    stream: Option<cpal::Stream>,
    reader: CaptureReader,
    sample_rate: u32,
    device_name: String,
}

impl CpalSource {
    /// Opens the default input device at `sample_rate` Hz.
    ///
    /// The stream is built but not played; capture begins with
    /// [`AudioSource::start`].
    ///
    /// # Arguments
    /// * `sample_rate` - Capture rate in Hz, must fall within a supported
    ///   f32 input configuration of the device
    ///
    /// # Returns
    /// * `Ok(source)` - Source ready to be started
    /// * `Err(e)` - No device, no matching configuration, or the stream
    ///   could not be built
    pub fn open(sample_rate: u32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(AudioError::NoInputDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown device>".to_string());
        log::info!("Opening {device_name}");

        let configs = device
            .supported_input_configs()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: e.to_string(),
            })?
            .collect::<Vec<_>>();
        let supported = find_supported_config(configs, sample_rate)
            .ok_or(AudioError::UnsupportedConfig { sample_rate })?;

        let config: cpal::StreamConfig = supported
            .with_sample_rate(cpal::SampleRate(sample_rate))
            .into();
        let channels = config.channels.max(1) as usize;
        log::debug!("Input config: {channels} channel(s) at {sample_rate} Hz");

        let (feed, reader) = capture_channel(CHANNEL_CAPACITY);
        let feed = Arc::new(feed);
        let error_feed = Arc::clone(&feed);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = if channels == 1 {
                        data.to_vec()
                    } else {
                        // first channel only
                        data.chunks(channels).map(|frame| frame[0]).collect()
                    };
                    feed.push_samples(mono);
                },
                move |err| error_feed.push_error(err.to_string()),
                None,
            )
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: e.to_string(),
            })?;

        Ok(Self {
            stream: Some(stream),
            reader,
            sample_rate,
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl AudioSource for CpalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self) -> Result<(), AudioError> {
        let stream = self.stream.as_ref().ok_or(AudioError::Disconnected)?;
        stream.play().map_err(|e| AudioError::StreamOpenFailed {
            reason: e.to_string(),
        })?;
        log::info!("Capturing from {}", self.device_name);
        // some hosts run the stream from the moment it is built
        self.reader.discard()
    }

    fn read(&mut self, frame: &mut [f32]) -> Result<(), AudioError> {
        if self.stream.is_none() {
            return Err(AudioError::Disconnected);
        }
        self.reader.read(frame)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(stream) = self.stream.take() {
            log::info!("Stopping capture on {}", self.device_name);
            stream.pause().map_err(|e| AudioError::StreamFailure {
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::warn!("Failed to stop input stream: {err}");
        }
    }
}

/// Picks an f32 input configuration whose rate range contains `target_rate`,
/// preferring the fewest channels.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
}

/// Frames supplied up front, for tests and offline analysis.
///
/// Samples queued with [`BufferedSource::with_pre_start`] stand in for audio
/// a device captured before the session began; `start` throws them away.
#[derive(Debug, Clone)]
pub struct BufferedSource {
    sample_rate: u32,
    pre_start: VecDeque<f32>,
    samples: VecDeque<f32>,
    started: bool,
    stopped: bool,
}

impl BufferedSource {
    pub fn new(sample_rate: u32, samples: impl IntoIterator<Item = f32>) -> Self {
        Self {
            sample_rate,
            pre_start: VecDeque::new(),
            samples: samples.into_iter().collect(),
            started: false,
            stopped: false,
        }
    }

    /// Queues samples that precede the session and must never be analyzed.
    pub fn with_pre_start(mut self, samples: impl IntoIterator<Item = f32>) -> Self {
        self.pre_start.extend(samples);
        self
    }

    /// Samples not yet read.
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl AudioSource for BufferedSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.pre_start.clear();
        self.started = true;
        Ok(())
    }

    /// Reads pre-start samples first if `start` was never called. Fails
    /// with `Disconnected` once fewer than a frame's worth remain.
    fn read(&mut self, frame: &mut [f32]) -> Result<(), AudioError> {
        if self.stopped || self.pre_start.len() + self.samples.len() < frame.len() {
            return Err(AudioError::Disconnected);
        }
        let len = frame.len();
        let stale = len.min(self.pre_start.len());
        let queued = self.pre_start.drain(..stale).chain(self.samples.drain(..len - stale));
        for (slot, sample) in frame.iter_mut().zip(queued) {
            *slot = sample;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.stopped = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_source_reads_whole_frames() {
        let mut source = BufferedSource::new(8000, (0..10).map(|i| i as f32));
        source.start().unwrap();
        let mut frame = [0.0; 4];
        source.read(&mut frame).unwrap();
        assert_eq!(frame, [0.0, 1.0, 2.0, 3.0]);
        source.read(&mut frame).unwrap();
        assert_eq!(frame, [4.0, 5.0, 6.0, 7.0]);
        assert!(matches!(source.read(&mut frame), Err(AudioError::Disconnected)));
        assert_eq!(source.remaining(), 2);
    }

    #[test]
    fn start_discards_pre_start_samples() {
        let mut source = BufferedSource::new(8000, [1.0; 4]).with_pre_start([9.0; 6]);
        source.start().unwrap();
        assert!(source.is_started());
        let mut frame = [0.0; 4];
        source.read(&mut frame).unwrap();
        assert_eq!(frame, [1.0; 4]);
    }

    #[test]
    fn stopped_source_fails_reads() {
        let mut source = BufferedSource::new(8000, vec![0.0; 8]);
        source.stop().unwrap();
        assert!(source.is_stopped());
        assert!(source.read(&mut [0.0; 4]).is_err());
    }

    #[test]
    fn capture_reader_assembles_frames_across_buffers() {
        let (feed, mut reader) = capture_channel(8);
        feed.push_samples(vec![1.0, 2.0, 3.0]);
        feed.push_samples(vec![4.0, 5.0]);
        let mut frame = [0.0; 4];
        reader.read(&mut frame).unwrap();
        assert_eq!(frame, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(reader.pending.len(), 1);
    }

    #[test]
    fn capture_reader_discard_drops_stale_audio() {
        let (feed, mut reader) = capture_channel(8);
        feed.push_samples(vec![9.0; 3]);
        reader.pending.extend([9.0, 9.0]);
        reader.discard().unwrap();
        assert!(reader.pending.is_empty());

        feed.push_samples(vec![1.0, 2.0]);
        let mut frame = [0.0; 2];
        reader.read(&mut frame).unwrap();
        assert_eq!(frame, [1.0, 2.0]);
    }

    #[test]
    fn device_error_fails_read_even_when_channel_is_full() {
        let (feed, mut reader) = capture_channel(2);
        feed.push_samples(vec![0.0]);
        feed.push_samples(vec![0.0]);
        feed.push_samples(vec![0.0]);
        assert_eq!(feed.dropped.load(Ordering::Relaxed), 1);

        feed.push_error("device unplugged".to_string());
        let err = reader.read(&mut [0.0; 8]).unwrap_err();
        assert!(matches!(err, AudioError::StreamFailure { ref reason } if reason == "device unplugged"));
    }

    #[test]
    fn device_error_wakes_a_reader_with_an_empty_channel() {
        let (feed, mut reader) = capture_channel(2);
        let handle = std::thread::spawn(move || reader.read(&mut [0.0; 4]));
        feed.push_error("stream lost".to_string());
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(AudioError::StreamFailure { .. })));
    }

    #[test]
    fn dropped_feed_disconnects_reader() {
        let (feed, mut reader) = capture_channel(2);
        drop(feed);
        assert!(matches!(reader.read(&mut [0.0; 4]), Err(AudioError::Disconnected)));
    }
}
