//! Application entry point: voice emotion widget.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Build the chunk fan-out and the capture session around [`CpalDriver`].
//! 5. Build the classifier client and the [`IngestCoordinator`].
//! 6. Spawn the pipeline runner and a result logger on the runtime.
//! 7. Run [`eframe::run_native`], which blocks the main thread until the
//!    window is closed.

use std::sync::Arc;

use tokio::sync::mpsc;
use voice_emotion::{
    app::EmotionApp,
    audio::{ChunkFanout, CpalDriver},
    capture::CaptureSession,
    classify::{Classifier, HttpClassifier},
    config::AppConfig,
    pipeline::{
        new_shared_state, IngestCoordinator, PipelineCommand, PipelineRunner, EMOTION_RESULT,
    },
};

use eframe::egui;

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let mut vp = egui::ViewportBuilder::default()
        .with_title("Voice Emotion")
        .with_inner_size([420.0, config.visualizer.height + 220.0])
        .with_min_inner_size([320.0, config.visualizer.height + 120.0])
        .with_drag_and_drop(true);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    if let Some((x, y)) = config.ui.window_position {
        vp = vp.with_position(egui::pos2(x, y));
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Voice emotion widget starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (normalisation runs on the blocking pool)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    // 4. Capture
    let fanout = ChunkFanout::new();
    let driver = CpalDriver::new(
        config.capture.audio_device.clone(),
        config.capture.block_size,
    );
    let session = CaptureSession::new(
        Box::new(driver),
        Arc::clone(&fanout),
        config.capture.max_recording(),
    );

    // 5. Classification
    let classifier: Arc<dyn Classifier> = Arc::new(HttpClassifier::from_config(&config.classifier));
    log::info!("Classifier endpoint: {}", config.classifier.endpoint);
    let coordinator = Arc::new(IngestCoordinator::new(
        classifier,
        config.ingest.max_duration_secs,
    ));

    // 6. Pipeline runner + result logger
    let state = new_shared_state(config.clone());
    let (command_tx, command_rx) = mpsc::channel::<PipelineCommand>(16);
    let results_rx = coordinator.subscribe();

    let mut log_rx = coordinator.subscribe();
    rt.spawn(async move {
        while let Some(result) = log_rx.recv().await {
            log::info!(
                "{EMOTION_RESULT}: {} ({:?})",
                result.prediction,
                result.confidence()
            );
        }
    });

    let runner = PipelineRunner::new(Arc::clone(&state), session, coordinator);
    rt.spawn(runner.run(command_rx));

    // 7. Build the egui app and run it (blocks until the window is closed)
    let app = EmotionApp::new(state, command_tx, results_rx, fanout, config.clone());
    let options = native_options(&config);

    eframe::run_native(
        "Voice Emotion",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("window error: {e}"))?;

    // Closing the command channel lets the runner stop an open recording.
    rt.shutdown_timeout(std::time::Duration::from_secs(2));
    log::info!("Voice emotion widget stopped");
    Ok(())
}
