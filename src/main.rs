//! Application entry point — voicekey.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Acquire the single-instance guard; exit if already running.
//! 3. Load [`AppConfig`] from disk (returns default on first run).
//! 4. Create the tokio runtime (multi-thread, 2 workers).
//! 5. Build the gateways (HTTP transcriber, API cleaner) and delivery.
//! 6. Start the cpal capture stream (the app still runs without a device;
//!    recording attempts then fail with a notification).
//! 7. Construct the [`PipelineController`] and register the hotkey.
//! 8. Warm the speech engine up in the background behind the staged
//!    startup progress curve.
//! 9. Run the controller's event loop — blocks for the process lifetime.

use std::sync::Arc;

use tokio::sync::mpsc;

use voicekey::{
    audio::MicRecorder,
    cleanup::{ApiCleaner, TextCleaner},
    config::{AppConfig, AppPaths},
    deliver::TextDelivery,
    hotkey::HotkeyEvent,
    instance::SingleInstance,
    pipeline::{new_shared_session, PipelineController, STARTUP_ESTIMATE_SECS},
    status::{BoundedNotifier, LogStatus, StatusObserver},
    stt::{HttpTranscriber, Transcriber},
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voicekey starting up");

    // 2. Single instance
    let _instance = SingleInstance::acquire("voicekey-single-instance");
    if _instance.already_running() {
        log::warn!("another instance is already running, exiting");
        return Ok(());
    }

    // 3. Configuration
    let paths = AppPaths::new();
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    std::fs::create_dir_all(config.temp_dir())?;
    if let Some(dir) = &config.model_cache_dir {
        // Advertise the cache location to a co-located speech service.
        std::env::set_var("MODELSCOPE_CACHE", dir);
    }

    // 4. Runtime (2 workers — one for the worker task, one for timers/animators)
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 5. Gateways and delivery
    let transcriber: Arc<dyn Transcriber> = Arc::new(HttpTranscriber::from_config(&config.stt));
    let cleaner: Arc<dyn TextCleaner> = Arc::new(ApiCleaner::from_config(&config.cleanup));
    let delivery = Arc::new(TextDelivery::new());

    // 6. Capture stream.  `cpal::Stream` is not Send, so the handle stays on
    //    this thread; the recorder itself is freely shareable.
    let recorder = Arc::new(MicRecorder::new());
    let _stream = match recorder.spawn_stream() {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("audio capture unavailable: {e}");
            None
        }
    };

    runtime.block_on(async {
        let observer: Arc<dyn StatusObserver> =
            Arc::new(BoundedNotifier::new(Arc::new(LogStatus), 8));

        // 7. Controller + hotkey
        let (hotkey_tx, hotkey_rx) = mpsc::channel::<HotkeyEvent>(16);
        let controller = PipelineController::new(
            new_shared_session(config),
            recorder,
            transcriber,
            cleaner,
            delivery,
            observer,
            hotkey_tx,
            paths.settings_file.clone(),
        );
        controller.register_hotkey();

        // 8. Background warm-up behind the staged startup curve
        let warm_up = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                controller.warm_up(STARTUP_ESTIMATE_SECS).await;
            })
        };

        // 9. Event loop — runs until the hotkey channel closes
        Arc::clone(&controller).run(hotkey_rx).await;
        let _ = warm_up.await;
    });

    Ok(())
}
