//! Status/progress sink — the pipeline's only outward surface.
//!
//! The core never talks to a tray icon, toast API or sound device directly;
//! it publishes through [`StatusObserver`] and the embedding layer decides
//! how to render.  [`LogStatus`] is the headless implementation used by the
//! binary; [`BoundedNotifier`] wraps any observer so that slow notification
//! side effects are fired-and-forgotten on a bounded task pool instead of
//! stalling the pipeline.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::pipeline::Phase;

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// Short, non-blocking feedback cues (the desktop build maps these to sounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// Recording has started.
    RecordStarted,
    /// Recording has stopped; processing begins.
    RecordStopped,
    /// The processing worker picked up a recording.
    Processing,
    /// The toggle was ignored because the pipeline is busy or not ready.
    Busy,
}

// ---------------------------------------------------------------------------
// StatusObserver trait
// ---------------------------------------------------------------------------

/// Observer interface consumed by the tray/UI layer.
///
/// All methods are called from worker or event-loop contexts and must return
/// quickly; anything slow belongs behind [`BoundedNotifier`].
pub trait StatusObserver: Send + Sync {
    /// Advisory pipeline progress in `[0.0, 1.0]`.
    fn on_progress(&self, fraction: f32);

    /// The session moved to a new phase.
    fn on_phase_changed(&self, phase: Phase);

    /// A user-facing notification (toast-style: short title + message).
    fn on_notify(&self, title: &str, message: &str);

    /// A feedback cue.
    fn on_feedback(&self, feedback: Feedback);
}

// ---------------------------------------------------------------------------
// LogStatus
// ---------------------------------------------------------------------------

/// Observer that renders everything to the log.
pub struct LogStatus;

impl StatusObserver for LogStatus {
    fn on_progress(&self, fraction: f32) {
        log::debug!("progress: {:.0}%", fraction * 100.0);
    }

    fn on_phase_changed(&self, phase: Phase) {
        log::info!("phase: {}", phase.label());
    }

    fn on_notify(&self, title: &str, message: &str) {
        log::info!("notify: {title} — {message}");
    }

    fn on_feedback(&self, feedback: Feedback) {
        log::debug!("feedback: {feedback:?}");
    }
}

// ---------------------------------------------------------------------------
// BoundedNotifier
// ---------------------------------------------------------------------------

/// Wraps an observer so notifications run fire-and-forget on a bounded pool.
///
/// Progress, phase and feedback callbacks pass straight through (they are
/// cheap by contract).  `on_notify` may hit a slow OS toast API, so it is
/// dispatched onto the tokio runtime; when more than `max_in_flight`
/// notifications are already pending, new ones are dropped with a debug log
/// rather than queueing without bound.
///
/// Must be used from within a tokio runtime.
pub struct BoundedNotifier<O> {
    inner: Arc<O>,
    permits: Arc<Semaphore>,
}

impl<O: StatusObserver + 'static> BoundedNotifier<O> {
    pub fn new(inner: Arc<O>, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight)),
        }
    }
}

impl<O: StatusObserver + 'static> StatusObserver for BoundedNotifier<O> {
    fn on_progress(&self, fraction: f32) {
        self.inner.on_progress(fraction);
    }

    fn on_phase_changed(&self, phase: Phase) {
        self.inner.on_phase_changed(phase);
    }

    fn on_notify(&self, title: &str, message: &str) {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => {
                let inner = Arc::clone(&self.inner);
                let title = title.to_string();
                let message = message.to_string();
                tokio::spawn(async move {
                    inner.on_notify(&title, &message);
                    drop(permit);
                });
            }
            Err(_) => {
                log::debug!("notification dropped (pool saturated): {title}");
            }
        }
    }

    fn on_feedback(&self, feedback: Feedback) {
        self.inner.on_feedback(feedback);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
