//! Session state — the single source of truth for hotkey gating and UI.
//!
//! Exactly one [`Session`] exists per process, held behind [`SharedSession`]
//! (`Arc<Mutex<Session>>`).  Every read-modify-write of [`Session::phase`]
//! must hold the lock; for simplicity *all* session access goes through it.

use std::sync::{Arc, Mutex};

use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Coarse pipeline state.
///
/// Transitions are linear and strictly serialized through the session lock:
///
/// ```text
/// Idle ──toggle──▶ Recording ──toggle/auto-stop──▶ Busy ──worker done──▶ Idle
/// ```
///
/// `Busy` never transitions to `Recording` directly; a toggle while busy is
/// acknowledged with feedback and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for the user to press the toggle hotkey.
    #[default]
    Idle,

    /// Microphone is armed; audio accumulates in the capture buffer.
    Recording,

    /// A processing worker owns the recording (transcribe → clean → paste).
    Busy,
}

impl Phase {
    /// A short human-readable label for logs and status rendering.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Recording => "recording",
            Phase::Busy => "busy",
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The single mutable record owned by the pipeline controller.
pub struct Session {
    /// Current pipeline phase.  Guarded by the session lock for every
    /// read-modify-write.
    pub phase: Phase,

    /// Raw transcript of the most recent recording, before cleanup.
    pub last_raw_text: Option<String>,

    /// Cleaned text of the most recent recording (or the raw transcript when
    /// cleanup degraded).
    pub last_clean_text: Option<String>,

    /// `true` once the speech engine finished warming up.
    pub model_ready: bool,

    /// Warm-up failure message, if the engine never became ready.
    pub model_error: Option<String>,

    /// Active configuration; swapped atomically under the lock by the
    /// settings action.
    pub config: AppConfig,
}

impl Session {
    pub fn new(config: AppConfig) -> Self {
        Self {
            phase: Phase::Idle,
            last_raw_text: None,
            last_clean_text: None,
            model_ready: false,
            model_error: None,
            config,
        }
    }
}

// ---------------------------------------------------------------------------
// SharedSession
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`Session`].
///
/// Cheap to clone (`Arc` clone).  Lock for a short critical section; never
/// hold the lock across `.await` points or gateway calls.
pub type SharedSession = Arc<Mutex<Session>>;

/// Construct a new [`SharedSession`].
pub fn new_shared_session(config: AppConfig) -> SharedSession {
    Arc::new(Mutex::new(Session::new(config)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
