//! Audio capture at the fixed pipeline format.
//!
//! ```text
//! Microphone → cpal callback → CaptureBuffer (armed + frame cap)
//!           → Recorder::stop → RecordingResult { pcm, wav }
//! ```
//!
//! Everything is 16 kHz / mono / 16-bit PCM; there is no format negotiation
//! or resampling.  See [`recorder::MicRecorder`] for the capture lifecycle
//! and [`wav`] for the container.

pub mod recorder;
pub mod wav;

pub use recorder::{
    CaptureBuffer, CaptureError, MicRecorder, Recorder, RecordingResult, StreamHandle,
};
pub use wav::{encode_wav, wav_sample_rate, SAMPLE_RATE};
