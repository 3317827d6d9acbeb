//! Speech-to-text gateway.
//!
//! The recognition engine is an external black box: the pipeline only knows
//! the blocking [`Transcriber`] trait.  Calls may take several seconds, so
//! the controller always runs them under `tokio::task::spawn_blocking`,
//! never on the hotkey path.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voicekey::stt::{HttpTranscriber, Transcriber};
//!
//! let engine = HttpTranscriber::new("http://127.0.0.1:8090", 60);
//! engine.warm_up().expect("speech service unavailable");
//!
//! // wav: 16 kHz mono PCM in a WAV container, from the audio module
//! # let wav: Vec<u8> = Vec::new();
//! let text = engine.transcribe(&wav).unwrap();
//! println!("{text}");
//! ```

pub mod http;

pub use http::HttpTranscriber;

use thiserror::Error;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// Errors surfaced by the transcription gateway.
#[derive(Debug, Error)]
pub enum SttError {
    /// The buffer is not a recognisable WAV stream.
    #[error("audio buffer is not a valid WAV stream")]
    InvalidWav,

    /// The recording is not at the fixed 16 kHz pipeline rate.
    #[error("recording sample rate must be 16 kHz (got {actual} Hz)")]
    SampleRate { actual: u32 },

    /// Transport-level failure talking to the speech service.
    #[error("speech service request failed: {0}")]
    Request(String),

    /// The speech service answered with an error.
    #[error("speech service error: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Blocking speech-to-text gateway.
///
/// Implementors must be `Send + Sync` so they can be shared across threads
/// (wrapped in `Arc<dyn Transcriber>`).
///
/// `transcribe` consumes a 16 kHz mono WAV buffer and returns the raw
/// transcript; an **empty string** means no speech was detected and is not
/// an error.  `warm_up` is the model-readiness probe gating the hotkey at
/// startup.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, wav: &[u8]) -> Result<String, SttError>;

    /// Block until the engine is ready to serve requests.
    fn warm_up(&self) -> Result<(), SttError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test double)
// ---------------------------------------------------------------------------

/// Scriptable [`Transcriber`] used by pipeline tests.
#[cfg(test)]
pub struct MockTranscriber {
    behaviour: MockBehaviour,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
enum MockBehaviour {
    Ok(String),
    Fail(String),
    Panic,
}

#[cfg(test)]
impl MockTranscriber {
    pub fn ok(text: &str) -> Self {
        Self {
            behaviour: MockBehaviour::Ok(text.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            behaviour: MockBehaviour::Fail(message.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn panicking() -> Self {
        Self {
            behaviour: MockBehaviour::Panic,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Transcriber for MockTranscriber {
    fn transcribe(&self, _wav: &[u8]) -> Result<String, SttError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        // Widen race windows a little so interleaving tests are meaningful.
        std::thread::sleep(std::time::Duration::from_millis(10));
        match &self.behaviour {
            MockBehaviour::Ok(text) => Ok(text.clone()),
            MockBehaviour::Fail(message) => Err(SttError::Engine(message.clone())),
            MockBehaviour::Panic => panic!("mock transcriber panic"),
        }
    }
}
