//! Pipeline controller — the single-flight coordination core.
//!
//! [`PipelineController`] owns the [`SharedSession`] and arbitrates between
//! the global hotkey, the recorder, the two gateway calls and text delivery.
//! Every phase transition goes through the session lock, which gives the two
//! guarantees everything else leans on:
//!
//! * **single flight** — no two recordings and no two processing workers can
//!   overlap, because `Recording` and `Busy` gate the toggle;
//! * **non-blocking hotkey** — `toggle` only ever takes the lock and checks
//!   state; the multi-second gateway calls run on a detached worker task.
//!
//! A stuck `Busy` phase would permanently disable the hotkey, so the worker
//! restores `Idle` through a drop guard that runs on every exit path,
//! including panics.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::audio::{Recorder, RecordingResult};
use crate::cleanup::{collapse_punctuation, CleanupError, TextCleaner};
use crate::config::AppConfig;
use crate::deliver::TextDelivery;
use crate::hotkey::{parse_chord, HotkeyEvent, HotkeyListener};
use crate::status::{Feedback, StatusObserver};
use crate::stt::Transcriber;

use super::progress::{ProgressStage, StageAnimator, StartupAnimator, STAGE_BOUNDARY};
use super::session::{Phase, Session, SharedSession};

/// Startup model-load estimate fed to the piecewise progress curve.
pub const STARTUP_ESTIMATE_SECS: f32 = 120.0;

// ---------------------------------------------------------------------------
// PipelineController
// ---------------------------------------------------------------------------

/// Coordinates hotkey → record → transcribe → clean → deliver.
///
/// Constructed once at startup and shared as `Arc<PipelineController>`; the
/// hotkey event loop, the auto-stop timer and menu-style actions all call
/// into the same instance and serialize through the session lock.  Methods
/// that spawn tasks must run inside a tokio runtime.
pub struct PipelineController {
    /// Self-handle for the timer and worker tasks the controller spawns.
    weak_self: Weak<PipelineController>,
    session: SharedSession,
    recorder: Arc<dyn Recorder>,
    transcriber: Arc<dyn Transcriber>,
    cleaner: Arc<dyn TextCleaner>,
    delivery: Arc<TextDelivery>,
    observer: Arc<dyn StatusObserver>,
    /// Pending auto-stop timer; at most one alive at a time.
    auto_stop: Mutex<Option<AbortHandle>>,
    /// Active hotkey listener, replaced when settings change.
    hotkey: Mutex<Option<HotkeyListener>>,
    hotkey_tx: mpsc::Sender<HotkeyEvent>,
    settings_path: PathBuf,
}

impl PipelineController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: SharedSession,
        recorder: Arc<dyn Recorder>,
        transcriber: Arc<dyn Transcriber>,
        cleaner: Arc<dyn TextCleaner>,
        delivery: Arc<TextDelivery>,
        observer: Arc<dyn StatusObserver>,
        hotkey_tx: mpsc::Sender<HotkeyEvent>,
        settings_path: PathBuf,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            session,
            recorder,
            transcriber,
            cleaner,
            delivery,
            observer,
            auto_stop: Mutex::new(None),
            hotkey: Mutex::new(None),
            hotkey_tx,
            settings_path,
        })
    }

    /// Shared session handle, for status rendering.
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Upgrade the self-handle; `None` only while the controller is being
    /// torn down, at which point spawning more work is pointless anyway.
    fn strong_self(&self) -> Option<Arc<Self>> {
        self.weak_self.upgrade()
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    /// Consume hotkey events until the channel closes.
    ///
    /// Spawn as a tokio task from `main()`; it never returns while the
    /// listener is alive.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<HotkeyEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                HotkeyEvent::Toggle => self.toggle(),
            }
        }
        log::info!("controller: hotkey channel closed, shutting down");
    }

    /// (Re-)register the global hotkey from the current config.
    ///
    /// Returns `false` (after notifying the user) when the configured chord
    /// does not parse; the previous listener, if any, keeps running in that
    /// case.
    pub fn register_hotkey(&self) -> bool {
        let binding = self.session.lock().unwrap().config.hotkey.clone();
        let Some(chord) = parse_chord(&binding) else {
            log::error!("unrecognised hotkey {binding:?}");
            self.observer
                .on_notify("快捷键错误", &format!("无法识别快捷键: {binding}"));
            return false;
        };

        let listener = HotkeyListener::start(chord, self.hotkey_tx.clone());
        // Dropping the previous listener stops its event forwarding.
        *self.hotkey.lock().unwrap() = Some(listener);
        log::info!("hotkey registered: {binding}");
        true
    }

    // -----------------------------------------------------------------------
    // Toggle state machine
    // -----------------------------------------------------------------------

    /// The only externally triggered transition.
    ///
    /// Safe to call concurrently from the hotkey loop, the auto-stop timer
    /// and menu actions — all serialize through the session lock and return
    /// quickly.
    pub fn toggle(&self) {
        let mut session = self.session.lock().unwrap();
        log::debug!("toggle: phase={}", session.phase.label());

        if session.phase == Phase::Busy {
            self.observer.on_feedback(Feedback::Busy);
            return;
        }

        if !session.model_ready {
            match &session.model_error {
                Some(error) => self.observer.on_notify("模型不可用", error),
                None => self.observer.on_notify("模型加载中", "请稍候再试"),
            }
            self.observer.on_feedback(Feedback::Busy);
            return;
        }

        match session.phase {
            Phase::Idle => self.start_recording(&mut session),
            Phase::Recording => self.stop_and_process(&mut session),
            Phase::Busy => unreachable!("busy handled above"),
        }
    }

    /// Begin a recording.  Caller holds the session lock with `phase == Idle`.
    fn start_recording(&self, session: &mut Session) {
        session.phase = Phase::Recording;

        if let Err(e) = self.recorder.start(session.config.max_seconds) {
            // Roll back — the session must never sit in `Recording` with no
            // capture running.
            log::error!("recorder start failed: {e}");
            session.phase = Phase::Idle;
            self.observer.on_notify("录音失败", &e.to_string());
            return;
        }

        self.observer.on_phase_changed(Phase::Recording);
        self.observer.on_feedback(Feedback::RecordStarted);
        self.arm_auto_stop(session.config.max_seconds);
        log::info!(
            "recording started (auto-stop in {} s)",
            session.config.max_seconds
        );
    }

    /// Stop the recording and hand the result to a detached worker.  Caller
    /// holds the session lock with `phase == Recording`.
    fn stop_and_process(&self, session: &mut Session) {
        if let Some(timer) = self.auto_stop.lock().unwrap().take() {
            timer.abort();
        }

        let recording = self.recorder.stop();
        session.phase = Phase::Busy;
        self.observer.on_phase_changed(Phase::Busy);
        self.observer.on_feedback(Feedback::RecordStopped);
        log::info!("recording stopped ({} bytes)", recording.pcm.len());

        // Detach so the hotkey caller returns immediately; the `Busy` gate
        // keeps this worker single-instance.
        let Some(controller) = self.strong_self() else {
            return;
        };
        tokio::spawn(async move {
            controller.process(recording).await;
        });
    }

    /// Arm the one-shot auto-stop timer for `max_seconds`.
    fn arm_auto_stop(&self, max_seconds: u64) {
        let Some(controller) = self.strong_self() else {
            return;
        };
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(max_seconds)).await;
            controller.auto_stop();
        });

        let mut slot = self.auto_stop.lock().unwrap();
        if let Some(stale) = slot.replace(task.abort_handle()) {
            stale.abort();
        }
    }

    /// Timer callback: stop only if still recording.  Exactly one of
    /// {manual stop, auto-stop} wins — decided by whoever takes the session
    /// lock first while `phase == Recording`.
    fn auto_stop(&self) {
        log::info!("auto-stop timer fired");
        let mut session = self.session.lock().unwrap();
        if session.phase == Phase::Recording {
            self.stop_and_process(&mut session);
        }
    }

    // -----------------------------------------------------------------------
    // Processing worker
    // -----------------------------------------------------------------------

    /// Transcribe → collapse punctuation → clean → deliver.
    ///
    /// Runs on a detached task.  The [`IdleGuard`] restores `phase = Idle` on
    /// every exit path — early returns, gateway failures, even panics — since
    /// a stuck `Busy` phase would disable the hotkey for good.
    async fn process(self: Arc<Self>, recording: RecordingResult) {
        let _idle = IdleGuard {
            session: Arc::clone(&self.session),
            observer: Arc::clone(&self.observer),
        };

        self.observer.on_progress(0.0);
        self.observer.on_feedback(Feedback::Processing);

        if recording.is_empty() {
            log::warn!("empty recording; transcription skipped");
            self.observer.on_notify("转写完成", "未识别到有效文本");
            return;
        }

        // ── Stage 1: transcription, 0 → 0.57 animated over 7 s ─────────────
        let animator = StageAnimator::spawn(ProgressStage::TRANSCRIBE, Arc::clone(&self.observer));
        let transcriber = Arc::clone(&self.transcriber);
        let wav = recording.wav;
        let outcome = tokio::task::spawn_blocking(move || transcriber.transcribe(&wav)).await;
        animator.cancel();

        let raw_text = match outcome {
            Ok(Ok(text)) => collapse_punctuation(text.trim()),
            Ok(Err(e)) => {
                log::error!("transcription failed: {e}");
                self.observer.on_notify("转写失败", &e.to_string());
                return;
            }
            Err(e) => {
                log::error!("transcription task died: {e}");
                self.observer.on_notify("转写失败", "内部错误");
                return;
            }
        };

        {
            let mut session = self.session.lock().unwrap();
            session.last_raw_text = (!raw_text.is_empty()).then(|| raw_text.clone());
        }

        if raw_text.is_empty() {
            log::info!("transcript empty; cleanup skipped");
            self.observer.on_notify("转写完成", "未识别到有效文本");
            return;
        }
        log::info!("transcript: {} chars", raw_text.chars().count());

        // Stage boundary: the jump from ≤0.57 to 0.60 is a fixed design
        // constant, not a measurement.
        self.observer.on_progress(STAGE_BOUNDARY);

        // ── Stage 2: cleanup, 0.60 → 0.97 animated over 3 s ────────────────
        let animator = StageAnimator::spawn(ProgressStage::CLEANUP, Arc::clone(&self.observer));
        let cleaned = self.cleaner.clean(&raw_text).await;
        animator.cancel();

        let clean_text = match cleaned {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => raw_text.clone(),
            Err(e) => {
                // Degrade, never abort: the raw transcript is still useful.
                self.handle_cleanup_failure(&e);
                raw_text.clone()
            }
        };

        self.observer.on_progress(1.0);

        {
            let mut session = self.session.lock().unwrap();
            session.last_clean_text = Some(clean_text.clone());
        }

        // ── Delivery ───────────────────────────────────────────────────────
        let delivery = Arc::clone(&self.delivery);
        let text = clean_text.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || delivery.write_and_paste(&text)).await
        {
            log::warn!("delivery task died: {e}");
        }

        self.observer.on_notify("转写完成", "文本已粘贴");
        // IdleGuard restores Idle and publishes the phase change.
    }

    /// Classify a cleanup failure and surface the matching prompt.
    fn handle_cleanup_failure(&self, error: &CleanupError) {
        log::warn!("cleanup failed, delivering raw transcript: {error}");
        match error {
            CleanupError::MissingCredentials => self.prompt_missing_credentials(),
            CleanupError::Auth(_) => {
                self.observer
                    .on_notify("整理服务鉴权失败", "请在设置中更新 API Key");
            }
            other => self.observer.on_notify("整理失败", &other.to_string()),
        }
    }

    /// One-time configuration prompt, silenced by the persisted suppression
    /// flag.
    fn prompt_missing_credentials(&self) {
        let suppressed = self
            .session
            .lock()
            .unwrap()
            .config
            .suppress_missing_credentials_prompt;
        if suppressed {
            log::debug!("missing-credentials prompt suppressed");
            return;
        }
        self.observer
            .on_notify("未配置整理服务", "请在设置中填写服务地址与 API Key");
    }

    /// Persist the user's "don't remind me again" choice.
    pub fn suppress_credentials_prompt(&self) -> anyhow::Result<()> {
        let config = {
            let mut session = self.session.lock().unwrap();
            session.config.suppress_missing_credentials_prompt = true;
            session.config.clone()
        };
        config.save_to(&self.settings_path)
    }

    // -----------------------------------------------------------------------
    // Menu-style actions
    // -----------------------------------------------------------------------

    /// Copy the last raw transcript to the clipboard (no paste).
    pub fn copy_raw(&self) {
        let text = self.session.lock().unwrap().last_raw_text.clone();
        if let Some(text) = text {
            self.delivery.write_only(&text);
            self.observer.on_notify("已复制", "原始文本已复制到剪贴板");
        }
    }

    /// Copy the last cleaned text to the clipboard (no paste).
    pub fn copy_clean(&self) {
        let text = self.session.lock().unwrap().last_clean_text.clone();
        if let Some(text) = text {
            self.delivery.write_only(&text);
            self.observer.on_notify("已复制", "整理文本已复制到剪贴板");
        }
    }

    /// Settings action: atomically swap the session's config, persist it and
    /// re-register the hotkey.  The next recording picks up the new
    /// `max_seconds` when the recorder is armed.
    pub fn apply_config(&self, new: AppConfig) -> anyhow::Result<()> {
        {
            let mut session = self.session.lock().unwrap();
            if session.config == new {
                return Ok(());
            }
            session.config = new.clone();
        }
        new.save_to(&self.settings_path)?;
        self.register_hotkey();
        log::info!("configuration updated");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Startup warm-up
    // -----------------------------------------------------------------------

    /// Warm the speech engine up while animating the startup progress curve.
    ///
    /// Sets `model_ready` (or `model_error`) on the session; until then every
    /// toggle answers with "model loading" feedback.
    pub async fn warm_up(&self, estimate_secs: f32) {
        let animator = StartupAnimator::spawn(estimate_secs, Arc::clone(&self.observer));
        let transcriber = Arc::clone(&self.transcriber);
        let outcome = tokio::task::spawn_blocking(move || transcriber.warm_up()).await;
        animator.cancel();

        match outcome {
            Ok(Ok(())) => {
                self.session.lock().unwrap().model_ready = true;
                self.observer.on_progress(1.0);
                self.observer.on_notify("模型就绪", "语音识别服务已就绪");
                log::info!("speech engine ready");
            }
            Ok(Err(e)) => {
                log::error!("speech engine warm-up failed: {e}");
                self.session.lock().unwrap().model_error = Some(e.to_string());
                self.observer.on_notify("模型加载失败", &e.to_string());
            }
            Err(e) => {
                log::error!("warm-up task died: {e}");
                self.session.lock().unwrap().model_error = Some("内部错误".into());
                self.observer.on_notify("模型加载失败", "内部错误");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// IdleGuard
// ---------------------------------------------------------------------------

/// Restores `phase = Idle` when the processing worker ends, however it ends.
struct IdleGuard {
    session: SharedSession,
    observer: Arc<dyn StatusObserver>,
}

impl Drop for IdleGuard {
    fn drop(&mut self) {
        let mut session = match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        session.phase = Phase::Idle;
        // Publish while still holding the lock so observers see phase events
        // in transition order.
        self.observer.on_phase_changed(Phase::Idle);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::audio::CaptureError;
    use crate::deliver::{ClipboardWriter, DeliveryError};
    use crate::pipeline::session::new_shared_session;
    use crate::stt::MockTranscriber;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Recorder whose `stop` yields a canned result.
    struct MockRecorder {
        fail_start: bool,
        result: Mutex<RecordingResult>,
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl MockRecorder {
        fn with_audio() -> Self {
            Self {
                fail_start: false,
                result: Mutex::new(RecordingResult {
                    pcm: vec![0u8; 3200],
                    wav: crate::audio::encode_wav(&vec![0u8; 3200]),
                }),
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
            }
        }

        fn empty() -> Self {
            Self {
                result: Mutex::new(RecordingResult::empty()),
                ..Self::with_audio()
            }
        }

        fn failing() -> Self {
            Self {
                fail_start: true,
                ..Self::with_audio()
            }
        }
    }

    impl Recorder for MockRecorder {
        fn start(&self, _max_seconds: u64) -> Result<(), CaptureError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                Err(CaptureError::StreamDown)
            } else {
                Ok(())
            }
        }

        fn stop(&self) -> RecordingResult {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.result.lock().unwrap().clone()
        }
    }

    /// Cleaner scripted to succeed or fail with a chosen error kind.
    struct MockCleaner {
        behaviour: CleanerBehaviour,
        inputs: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    enum CleanerBehaviour {
        Ok(String),
        MissingCredentials,
        Auth,
        Request,
    }

    impl MockCleaner {
        fn ok(text: &str) -> Self {
            Self::new(CleanerBehaviour::Ok(text.into()))
        }

        fn new(behaviour: CleanerBehaviour) -> Self {
            Self {
                behaviour,
                inputs: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextCleaner for MockCleaner {
        async fn clean(&self, raw: &str) -> Result<String, CleanupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inputs.lock().unwrap().push(raw.to_string());
            match &self.behaviour {
                CleanerBehaviour::Ok(text) => Ok(text.clone()),
                CleanerBehaviour::MissingCredentials => Err(CleanupError::MissingCredentials),
                CleanerBehaviour::Auth => Err(CleanupError::Auth("401".into())),
                CleanerBehaviour::Request => Err(CleanupError::Request("boom".into())),
            }
        }
    }

    /// Observer that records every event for later assertions.
    #[derive(Default)]
    struct CollectingObserver {
        progress: Mutex<Vec<f32>>,
        phases: Mutex<Vec<Phase>>,
        notifies: Mutex<Vec<(String, String)>>,
        feedback: Mutex<Vec<Feedback>>,
    }

    impl CollectingObserver {
        fn phases(&self) -> Vec<Phase> {
            self.phases.lock().unwrap().clone()
        }

        fn notify_count(&self, title: &str) -> usize {
            self.notifies
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, _)| t == title)
                .count()
        }

        fn progress(&self) -> Vec<f32> {
            self.progress.lock().unwrap().clone()
        }

        fn feedback(&self) -> Vec<Feedback> {
            self.feedback.lock().unwrap().clone()
        }
    }

    impl StatusObserver for CollectingObserver {
        fn on_progress(&self, fraction: f32) {
            self.progress.lock().unwrap().push(fraction);
        }
        fn on_phase_changed(&self, phase: Phase) {
            self.phases.lock().unwrap().push(phase);
        }
        fn on_notify(&self, title: &str, message: &str) {
            self.notifies
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
        }
        fn on_feedback(&self, feedback: Feedback) {
            self.feedback.lock().unwrap().push(feedback);
        }
    }

    /// Clipboard writer that records delivered text.
    struct RecordingWriter {
        texts: Arc<Mutex<Vec<String>>>,
    }

    impl ClipboardWriter for RecordingWriter {
        fn name(&self) -> &'static str {
            "recording"
        }
        fn write(&self, text: &str) -> Result<(), DeliveryError> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }
        fn read_back(&self) -> Option<String> {
            self.texts.lock().unwrap().last().cloned()
        }
    }

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Harness {
        controller: Arc<PipelineController>,
        observer: Arc<CollectingObserver>,
        recorder: Arc<MockRecorder>,
        transcriber: Arc<MockTranscriber>,
        cleaner: Arc<MockCleaner>,
        delivered: Arc<Mutex<Vec<String>>>,
        settings_dir: tempfile::TempDir,
    }

    impl Harness {
        fn session(&self) -> &SharedSession {
            self.controller.session()
        }

        fn phase(&self) -> Phase {
            self.session().lock().unwrap().phase
        }

        fn mark_model_ready(&self) {
            self.session().lock().unwrap().model_ready = true;
        }

        fn settings_path(&self) -> PathBuf {
            self.settings_dir.path().join("settings.toml")
        }

        /// Poll until the session settles at `Idle` (all workers done).
        async fn wait_for_idle(&self) {
            for _ in 0..500 {
                if self.phase() == Phase::Idle {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("pipeline never returned to Idle");
        }

        fn delivered(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    fn harness(
        recorder: MockRecorder,
        transcriber: MockTranscriber,
        cleaner: MockCleaner,
        config: AppConfig,
    ) -> Harness {
        let settings_dir = tempfile::tempdir().expect("temp dir");
        let settings_path = settings_dir.path().join("settings.toml");

        let observer = Arc::new(CollectingObserver::default());
        let recorder = Arc::new(recorder);
        let transcriber = Arc::new(transcriber);
        let cleaner = Arc::new(cleaner);

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let delivery = Arc::new(TextDelivery::with_parts(
            vec![Box::new(RecordingWriter {
                texts: Arc::clone(&delivered),
            })],
            vec![],
            Duration::ZERO,
        ));

        let (hotkey_tx, _hotkey_rx) = mpsc::channel(16);
        let controller = PipelineController::new(
            new_shared_session(config),
            Arc::clone(&recorder) as Arc<dyn Recorder>,
            Arc::clone(&transcriber) as Arc<dyn Transcriber>,
            Arc::clone(&cleaner) as Arc<dyn TextCleaner>,
            delivery,
            Arc::clone(&observer) as Arc<dyn StatusObserver>,
            hotkey_tx,
            settings_path,
        );

        Harness {
            controller,
            observer,
            recorder,
            transcriber,
            cleaner,
            delivered,
            settings_dir,
        }
    }

    fn default_harness() -> Harness {
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::ok("今天天气不错"),
            MockCleaner::ok("今天天气不错。"),
            AppConfig::default(),
        );
        h.mark_model_ready();
        h
    }

    // -----------------------------------------------------------------------
    // Toggle gating
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn toggle_from_idle_starts_recording() {
        let h = default_harness();

        h.controller.toggle();

        assert_eq!(h.phase(), Phase::Recording);
        assert_eq!(h.recorder.starts.load(Ordering::SeqCst), 1);
        assert_eq!(h.observer.feedback(), vec![Feedback::RecordStarted]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn toggle_while_busy_is_acknowledged_and_ignored() {
        let h = default_harness();
        h.session().lock().unwrap().phase = Phase::Busy;

        h.controller.toggle();

        assert_eq!(h.phase(), Phase::Busy);
        assert_eq!(h.recorder.starts.load(Ordering::SeqCst), 0);
        assert_eq!(h.observer.feedback(), vec![Feedback::Busy]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn toggle_before_model_ready_notifies_loading() {
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::ok("text"),
            MockCleaner::ok("text"),
            AppConfig::default(),
        );

        h.controller.toggle();

        assert_eq!(h.phase(), Phase::Idle);
        assert_eq!(h.recorder.starts.load(Ordering::SeqCst), 0);
        assert_eq!(h.observer.notify_count("模型加载中"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn toggle_with_model_error_notifies_unavailable() {
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::ok("text"),
            MockCleaner::ok("text"),
            AppConfig::default(),
        );
        h.session().lock().unwrap().model_error = Some("no backend".into());

        h.controller.toggle();

        assert_eq!(h.phase(), Phase::Idle);
        assert_eq!(h.observer.notify_count("模型不可用"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn capture_failure_rolls_back_to_idle() {
        let h = harness(
            MockRecorder::failing(),
            MockTranscriber::ok("text"),
            MockCleaner::ok("text"),
            AppConfig::default(),
        );
        h.mark_model_ready();

        h.controller.toggle();

        assert_eq!(h.phase(), Phase::Idle, "session must not stay Recording");
        assert_eq!(h.observer.notify_count("录音失败"), 1);
    }

    // -----------------------------------------------------------------------
    // Full pipeline runs
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn full_run_delivers_cleaned_text_and_returns_to_idle() {
        let h = default_harness();

        h.controller.toggle(); // start
        h.controller.toggle(); // stop + process
        h.wait_for_idle().await;

        assert_eq!(h.delivered(), vec!["今天天气不错。"]);
        let session = h.session().lock().unwrap();
        assert_eq!(session.last_raw_text.as_deref(), Some("今天天气不错"));
        assert_eq!(session.last_clean_text.as_deref(), Some("今天天气不错。"));
        drop(session);

        // Progress includes the fixed boundary and completion publishes.
        let progress = h.observer.progress();
        assert!(progress.contains(&0.0));
        assert!(progress.contains(&STAGE_BOUNDARY));
        assert!(progress.contains(&1.0));

        assert_eq!(h.observer.notify_count("转写完成"), 1);
        assert_eq!(
            h.observer.phases(),
            vec![Phase::Recording, Phase::Busy, Phase::Idle]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn punctuation_runs_are_collapsed_before_cleanup() {
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::ok("好的，，，。。谢谢！！"),
            MockCleaner::ok("好的。谢谢！"),
            AppConfig::default(),
        );
        h.mark_model_ready();

        h.controller.toggle();
        h.controller.toggle();
        h.wait_for_idle().await;

        assert_eq!(
            h.cleaner.inputs.lock().unwrap().as_slice(),
            ["好的。谢谢！"]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transcription_failure_returns_to_idle_without_cleanup() {
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::fail("engine unavailable"),
            MockCleaner::ok("unused"),
            AppConfig::default(),
        );
        h.mark_model_ready();

        h.controller.toggle();
        h.controller.toggle();
        h.wait_for_idle().await;

        assert_eq!(h.cleaner.calls(), 0);
        assert!(h.delivered().is_empty());
        assert_eq!(h.observer.notify_count("转写失败"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transcriber_panic_still_restores_idle() {
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::panicking(),
            MockCleaner::ok("unused"),
            AppConfig::default(),
        );
        h.mark_model_ready();

        h.controller.toggle();
        h.controller.toggle();
        h.wait_for_idle().await;

        assert_eq!(h.phase(), Phase::Idle);
        assert_eq!(h.observer.notify_count("转写失败"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_recording_skips_the_transcription_gateway() {
        let h = harness(
            MockRecorder::empty(),
            MockTranscriber::ok("should not run"),
            MockCleaner::ok("should not run"),
            AppConfig::default(),
        );
        h.mark_model_ready();

        h.controller.toggle();
        h.controller.toggle();
        h.wait_for_idle().await;

        assert_eq!(h.transcriber.calls(), 0);
        assert_eq!(h.cleaner.calls(), 0);
        assert_eq!(h.observer.notify_count("转写完成"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_transcript_skips_the_cleanup_gateway() {
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::ok("   "),
            MockCleaner::ok("should not run"),
            AppConfig::default(),
        );
        h.mark_model_ready();

        h.controller.toggle();
        h.controller.toggle();
        h.wait_for_idle().await;

        assert_eq!(h.cleaner.calls(), 0);
        assert!(h.delivered().is_empty());
        assert_eq!(h.observer.notify_count("转写完成"), 1);
        assert!(h.session().lock().unwrap().last_raw_text.is_none());
    }

    // -----------------------------------------------------------------------
    // Cleanup degradation
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_credentials_delivers_raw_and_prompts_once() {
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::ok("今天天气不错"),
            MockCleaner::new(CleanerBehaviour::MissingCredentials),
            AppConfig::default(),
        );
        h.mark_model_ready();

        h.controller.toggle();
        h.controller.toggle();
        h.wait_for_idle().await;

        // The raw transcript is delivered, not dropped.
        assert_eq!(h.delivered(), vec!["今天天气不错"]);
        assert_eq!(h.observer.notify_count("未配置整理服务"), 1);

        // Suppress and run again: still delivers, never prompts again.
        h.controller.suppress_credentials_prompt().unwrap();
        h.controller.toggle();
        h.controller.toggle();
        h.wait_for_idle().await;

        assert_eq!(h.delivered().len(), 2);
        assert_eq!(h.observer.notify_count("未配置整理服务"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn auth_error_delivers_raw_and_prompts_for_key() {
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::ok("原始文本"),
            MockCleaner::new(CleanerBehaviour::Auth),
            AppConfig::default(),
        );
        h.mark_model_ready();

        h.controller.toggle();
        h.controller.toggle();
        h.wait_for_idle().await;

        assert_eq!(h.delivered(), vec!["原始文本"]);
        assert_eq!(h.observer.notify_count("整理服务鉴权失败"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn generic_cleanup_error_delivers_raw_with_notification() {
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::ok("原始文本"),
            MockCleaner::new(CleanerBehaviour::Request),
            AppConfig::default(),
        );
        h.mark_model_ready();

        h.controller.toggle();
        h.controller.toggle();
        h.wait_for_idle().await;

        assert_eq!(h.delivered(), vec!["原始文本"]);
        assert_eq!(h.observer.notify_count("整理失败"), 1);
    }

    // -----------------------------------------------------------------------
    // Auto-stop and races
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn auto_stop_fires_without_a_second_toggle() {
        let mut config = AppConfig::default();
        config.max_seconds = 0; // timer fires immediately
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::ok("自动停止"),
            MockCleaner::ok("自动停止。"),
            config,
        );
        h.mark_model_ready();

        h.controller.toggle(); // start only
        h.wait_for_idle().await;

        assert_eq!(h.transcriber.calls(), 1);
        assert_eq!(h.delivered(), vec!["自动停止。"]);
    }

    /// Exactly one of {manual stop, auto-stop} wins the race for each
    /// recording — never zero, never two.
    #[tokio::test(flavor = "multi_thread")]
    async fn manual_and_auto_stop_race_processes_exactly_once() {
        for _ in 0..10 {
            let mut config = AppConfig::default();
            config.max_seconds = 0;
            let h = harness(
                MockRecorder::with_audio(),
                MockTranscriber::ok("race"),
                MockCleaner::ok("race"),
                config,
            );
            h.mark_model_ready();

            h.controller.toggle(); // start; auto-stop armed for "now"
            h.controller.toggle(); // manual stop racing the timer
            h.wait_for_idle().await;
            // Give a late-firing timer a chance to do damage before checking.
            tokio::time::sleep(Duration::from_millis(30)).await;
            h.wait_for_idle().await;

            // A stuck recording would trip wait_for_idle ("never zero"); here
            // every started recording must have been stopped and processed
            // exactly once ("never two").
            let starts = h.recorder.starts.load(Ordering::SeqCst);
            let stops = h.recorder.stops.load(Ordering::SeqCst);
            assert!(starts >= 1);
            assert_eq!(stops, starts);
            assert_eq!(h.transcriber.calls(), stops);
        }
    }

    /// Hammer the toggle from many tasks: observed phase changes must remain
    /// a legal serialization — no two overlapping recordings or workers.
    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_toggles_serialize_phase_transitions() {
        let h = default_harness();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let controller = Arc::clone(&h.controller);
            tasks.push(tokio::spawn(async move {
                controller.toggle();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Quiesce: finish any in-flight worker, then close a recording left
        // open by an odd number of effective toggles.
        tokio::time::sleep(Duration::from_millis(100)).await;
        if h.phase() == Phase::Recording {
            h.controller.toggle();
        }
        h.wait_for_idle().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let phases = h.observer.phases();
        let mut previous: Option<Phase> = None;
        for phase in &phases {
            match phase {
                Phase::Recording => {
                    assert!(
                        previous.is_none() || previous == Some(Phase::Idle),
                        "recording started from {previous:?} in {phases:?}"
                    );
                }
                Phase::Busy => {
                    assert_eq!(
                        previous,
                        Some(Phase::Recording),
                        "worker started from {previous:?} in {phases:?}"
                    );
                }
                Phase::Idle => {
                    assert_eq!(
                        previous,
                        Some(Phase::Busy),
                        "idle restored from {previous:?} in {phases:?}"
                    );
                }
            }
            previous = Some(*phase);
        }
    }

    // -----------------------------------------------------------------------
    // Warm-up
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn warm_up_success_marks_model_ready() {
        let h = harness(
            MockRecorder::with_audio(),
            MockTranscriber::ok("text"),
            MockCleaner::ok("text"),
            AppConfig::default(),
        );

        h.controller.warm_up(120.0).await;

        let session = h.session().lock().unwrap();
        assert!(session.model_ready);
        assert!(session.model_error.is_none());
        drop(session);

        assert!(h.observer.progress().contains(&1.0));
        assert_eq!(h.observer.notify_count("模型就绪"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn warm_up_failure_records_model_error() {
        struct ColdTranscriber;
        impl Transcriber for ColdTranscriber {
            fn transcribe(&self, _wav: &[u8]) -> Result<String, crate::stt::SttError> {
                Ok(String::new())
            }
            fn warm_up(&self) -> Result<(), crate::stt::SttError> {
                Err(crate::stt::SttError::Engine("model missing".into()))
            }
        }

        let settings_dir = tempfile::tempdir().unwrap();
        let observer = Arc::new(CollectingObserver::default());
        let (hotkey_tx, _rx) = mpsc::channel(4);
        let controller = PipelineController::new(
            new_shared_session(AppConfig::default()),
            Arc::new(MockRecorder::with_audio()),
            Arc::new(ColdTranscriber),
            Arc::new(MockCleaner::ok("text")),
            Arc::new(TextDelivery::with_parts(vec![], vec![], Duration::ZERO)),
            Arc::clone(&observer) as Arc<dyn StatusObserver>,
            hotkey_tx,
            settings_dir.path().join("settings.toml"),
        );

        controller.warm_up(120.0).await;

        let session = controller.session().lock().unwrap();
        assert!(!session.model_ready);
        assert!(session
            .model_error
            .as_deref()
            .is_some_and(|e| e.contains("model missing")));
        drop(session);
        assert_eq!(observer.notify_count("模型加载失败"), 1);
    }

    // -----------------------------------------------------------------------
    // Menu actions and config
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn copy_actions_use_the_last_texts() {
        let h = default_harness();

        // Nothing recorded yet: both copies are no-ops.
        h.controller.copy_raw();
        h.controller.copy_clean();
        assert!(h.delivered().is_empty());

        h.controller.toggle();
        h.controller.toggle();
        h.wait_for_idle().await;
        let after_run = h.delivered().len();

        h.controller.copy_raw();
        h.controller.copy_clean();

        let delivered = h.delivered();
        assert_eq!(delivered.len(), after_run + 2);
        assert_eq!(delivered[after_run], "今天天气不错");
        assert_eq!(delivered[after_run + 1], "今天天气不错。");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_config_swaps_and_persists() {
        let h = default_harness();

        let mut new_config = AppConfig::default();
        new_config.max_seconds = 60;
        new_config.cleanup.api_key = "sk-new".into();

        h.controller.apply_config(new_config.clone()).unwrap();

        assert_eq!(h.session().lock().unwrap().config, new_config);
        let persisted = AppConfig::load_from(&h.settings_path()).unwrap();
        assert_eq!(persisted, new_config);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_config_with_unchanged_config_is_a_noop() {
        let h = default_harness();

        h.controller.apply_config(AppConfig::default()).unwrap();

        assert!(
            !h.settings_path().exists(),
            "unchanged config must not be written"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn suppression_flag_is_persisted() {
        let h = default_harness();

        h.controller.suppress_credentials_prompt().unwrap();

        assert!(h
            .session()
            .lock()
            .unwrap()
            .config
            .suppress_missing_credentials_prompt);
        let persisted = AppConfig::load_from(&h.settings_path()).unwrap();
        assert!(persisted.suppress_missing_credentials_prompt);
    }
}
