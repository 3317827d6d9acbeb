//! Staged fake progress.
//!
//! Neither the transcription nor the cleanup call reports real progress, so
//! the controller animates a plausible curve over wall time instead:
//!
//! * stage 1 (transcription): 0 → 0.57 over 7 s
//! * boundary publish at 0.60 — the 3-point jump marks the stage change
//! * stage 2 (cleanup): 0.60 → 0.97 over 3 s
//! * completion publish at 1.0
//!
//! A second, piecewise curve estimates startup model-load progress.  Both
//! are purely cosmetic: they never gate real work and are cancelled the
//! instant the underlying operation finishes, early or late.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::status::StatusObserver;

/// Publish interval for animated progress.
const TICK: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// ProgressStage
// ---------------------------------------------------------------------------

/// One animated progress segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressStage {
    /// Fraction published at `elapsed = 0`.
    pub start: f32,
    /// Upper bound; the animation never exceeds it.
    pub end: f32,
    /// Seconds over which the segment runs from `start` to `end`.
    pub duration_secs: f32,
}

impl ProgressStage {
    /// Transcription stage: 0 → 0.57 over 7 seconds.
    pub const TRANSCRIBE: ProgressStage = ProgressStage {
        start: 0.0,
        end: 0.57,
        duration_secs: 7.0,
    };

    /// Cleanup stage: 0.60 → 0.97 over 3 seconds.
    pub const CLEANUP: ProgressStage = ProgressStage {
        start: 0.60,
        end: 0.97,
        duration_secs: 3.0,
    };

    /// Linear interpolation of this stage at `elapsed_secs`, clamped to
    /// `end`.  Pure function of elapsed time.
    pub fn progress_at(&self, elapsed_secs: f32) -> f32 {
        if self.duration_secs <= 0.0 {
            return self.end;
        }
        let frac = (elapsed_secs / self.duration_secs).clamp(0.0, 1.0);
        self.start + (self.end - self.start) * frac
    }
}

/// Fraction published between the two stages; the deliberate gap above
/// `TRANSCRIBE.end` signals "stage boundary" to progress observers.
pub const STAGE_BOUNDARY: f32 = 0.60;

// ---------------------------------------------------------------------------
// Startup estimator
// ---------------------------------------------------------------------------

/// Piecewise model-load progress estimate.
///
/// 0–5 s → 0–50 %, 5–10 s → 50–80 %, 10–15 s → 80–90 %, then a slow crawl
/// from 90 % towards 98 % until `estimate_secs`.  Hard-capped at 0.98; the
/// real completion signal jumps the display to 1.0.
pub fn startup_progress(elapsed_secs: f32, estimate_secs: f32) -> f32 {
    let p = if elapsed_secs <= 5.0 {
        0.50 * (elapsed_secs / 5.0)
    } else if elapsed_secs <= 10.0 {
        0.50 + 0.30 * ((elapsed_secs - 5.0) / 5.0)
    } else if elapsed_secs <= 15.0 {
        0.80 + 0.10 * ((elapsed_secs - 10.0) / 5.0)
    } else {
        let tail = ((elapsed_secs - 15.0) / (estimate_secs - 15.0).max(1.0)).min(1.0);
        0.90 + 0.08 * tail
    };
    p.min(0.98)
}

// ---------------------------------------------------------------------------
// StageAnimator
// ---------------------------------------------------------------------------

/// Runs one [`ProgressStage`] animation on a background task.
///
/// The task publishes through the observer every [`TICK`] until the stage
/// reaches its `end` or [`StageAnimator::cancel`] is called.  Cancellation is
/// always safe and lossless — the animation has no side effects beyond
/// progress publication.
pub struct StageAnimator {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl StageAnimator {
    /// Spawn the animation task for `stage`.
    pub fn spawn(stage: ProgressStage, observer: Arc<dyn StatusObserver>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_task = Arc::clone(&stop);

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            loop {
                if stop_task.load(Ordering::Relaxed) {
                    return;
                }
                let fraction = stage.progress_at(started.elapsed().as_secs_f32());
                observer.on_progress(fraction);
                if fraction >= stage.end {
                    return;
                }
                tokio::time::sleep(TICK).await;
            }
        });

        Self { stop, handle }
    }

    /// Stop the animation immediately; no further progress is published.
    pub fn cancel(self) {
        self.stop.store(true, Ordering::Relaxed);
        self.handle.abort();
    }
}

/// Runs the piecewise startup curve until cancelled.
///
/// Unlike [`StageAnimator`] this never finishes on its own — the curve is
/// capped at 0.98 and only the real model-ready signal ends it.
pub struct StartupAnimator {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl StartupAnimator {
    pub fn spawn(estimate_secs: f32, observer: Arc<dyn StatusObserver>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_task = Arc::clone(&stop);

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            loop {
                if stop_task.load(Ordering::Relaxed) {
                    return;
                }
                let fraction = startup_progress(started.elapsed().as_secs_f32(), estimate_secs);
                observer.on_progress(fraction);
                tokio::time::sleep(TICK).await;
            }
        });

        Self { stop, handle }
    }

    pub fn cancel(self) {
        self.stop.store(true, Ordering::Relaxed);
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
