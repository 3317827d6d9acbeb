//! Microphone capture at a fixed 16 kHz / mono / 16-bit format via `cpal`.
//!
//! `cpal::Stream` is not `Send`, so the stream itself lives on the thread
//! that called [`MicRecorder::spawn_stream`] (normally `main`) for the whole
//! process lifetime.  Recording is gated by an *armed* flag inside the shared
//! [`CaptureBuffer`]: [`Recorder::start`] clears and arms the buffer,
//! [`Recorder::stop`] disarms it and drains the accumulated samples.
//!
//! The capture callback enforces a hard frame cap of
//! `max_seconds × 16_000` independent of any wall-clock timer — once the cap
//! is reached the buffer disarms itself and further chunks are discarded,
//! even if the controller's auto-stop timer is delayed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::wav;

// ---------------------------------------------------------------------------
// RecordingResult
// ---------------------------------------------------------------------------

/// Immutable output of one recording.
///
/// Produced once by [`Recorder::stop`] and handed to the processing worker;
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingResult {
    /// Raw 16-bit LE mono PCM bytes.
    pub pcm: Vec<u8>,
    /// The same audio wrapped in a WAV container for the transcription
    /// gateway.
    pub wav: Vec<u8>,
}

impl RecordingResult {
    /// A result carrying no audio (stop without capture, or zero chunks).
    pub fn empty() -> Self {
        Self {
            pcm: Vec::new(),
            wav: Vec::new(),
        }
    }

    /// `true` when no audio was captured.
    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    fn from_samples(samples: &[i16]) -> Self {
        let mut pcm = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
        let wav = wav::encode_wav(&pcm);
        Self { pcm, wav }
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised while opening or arming the capture stream.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("audio input stream is not running")]
    StreamDown,

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// Recorder trait
// ---------------------------------------------------------------------------

/// Start/stop surface the pipeline controller drives.
///
/// `start` fails when the capture device is unavailable so the controller can
/// roll the session back to idle instead of leaving it stuck in a recording
/// phase.  `stop` is idempotent: calling it while not capturing returns an
/// empty [`RecordingResult`].
pub trait Recorder: Send + Sync {
    /// Begin capturing, with a hard cap of `max_seconds × 16_000` frames.
    fn start(&self, max_seconds: u64) -> Result<(), CaptureError>;

    /// Halt capture and return everything recorded since `start`.
    fn stop(&self) -> RecordingResult;
}

// ---------------------------------------------------------------------------
// CaptureBuffer
// ---------------------------------------------------------------------------

/// Accumulator shared between the cpal callback and the recorder.
///
/// While armed it appends incoming chunks up to `max_frames`, then disarms
/// itself.  The frame cap is authoritative; the controller's timer only
/// decides *when* the result is collected.
pub struct CaptureBuffer {
    samples: Vec<i16>,
    max_frames: usize,
    armed: bool,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            max_frames: 0,
            armed: false,
        }
    }

    /// Clear previous audio and begin accepting chunks, up to `max_frames`.
    pub fn arm(&mut self, max_frames: usize) {
        self.samples.clear();
        self.max_frames = max_frames;
        self.armed = true;
    }

    /// Stop accepting chunks and drain the accumulated samples.
    pub fn disarm(&mut self) -> Vec<i16> {
        self.armed = false;
        std::mem::take(&mut self.samples)
    }

    /// Append a chunk from the capture callback, truncated to the frame cap.
    pub fn push(&mut self, chunk: &[i16]) {
        if !self.armed {
            return;
        }
        let remaining = self.max_frames.saturating_sub(self.samples.len());
        let take = remaining.min(chunk.len());
        self.samples.extend_from_slice(&chunk[..take]);
        if self.samples.len() >= self.max_frames {
            // Cap reached: stop accepting frames regardless of the timer.
            self.armed = false;
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// MicRecorder
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping it stops the underlying hardware stream.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

/// cpal-backed [`Recorder`].
///
/// The struct itself only holds the shared buffer, so it is `Send + Sync`
/// and can live behind `Arc<dyn Recorder>`; the non-`Send` stream is pinned
/// to the spawning thread via [`StreamHandle`].
pub struct MicRecorder {
    buffer: Arc<Mutex<CaptureBuffer>>,
    stream_up: Arc<AtomicBool>,
}

impl MicRecorder {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(CaptureBuffer::new())),
            stream_up: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open the default input device with the fixed 16 kHz mono i16 config
    /// and start streaming into the shared buffer.
    ///
    /// Keep the returned [`StreamHandle`] alive for as long as recording
    /// should be possible; dropping it stops the stream.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NoDevice`] when no input device exists,
    /// [`CaptureError::BuildStream`] / [`CaptureError::PlayStream`] when the
    /// platform rejects the fixed stream configuration.
    pub fn spawn_stream(&self) -> Result<StreamHandle, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let config = cpal::StreamConfig {
            channels: wav::CHANNELS,
            sample_rate: cpal::SampleRate(wav::SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::clone(&self.buffer);
        let stream = device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                buffer.lock().unwrap().push(data);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        self.stream_up.store(true, Ordering::SeqCst);
        log::info!("audio capture stream running (16 kHz, mono, i16)");

        Ok(StreamHandle { _stream: stream })
    }
}

impl Default for MicRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for MicRecorder {
    fn start(&self, max_seconds: u64) -> Result<(), CaptureError> {
        if !self.stream_up.load(Ordering::SeqCst) {
            return Err(CaptureError::StreamDown);
        }
        let max_frames = (max_seconds as usize) * wav::SAMPLE_RATE as usize;
        self.buffer.lock().unwrap().arm(max_frames);
        Ok(())
    }

    fn stop(&self) -> RecordingResult {
        let samples = self.buffer.lock().unwrap().disarm();
        if samples.is_empty() {
            return RecordingResult::empty();
        }
        RecordingResult::from_samples(&samples)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
