//! Voice emotion widget: the egui/eframe application.
//!
//! # Architecture
//!
//! [`EmotionApp`] is the top-level [`eframe::App`].  It owns:
//!
//! * `command_tx` sends [`PipelineCommand`]s to the pipeline runner.
//! * `state`      holds the [`SharedState`] the runner writes; read every frame.
//! * `results_rx` is an `emotionResult` subscription; every published
//!   [`ClassificationResult`] lands here.
//! * `visualizer` is the [`SpectralVisualizer`], activated while capturing and
//!   fed from the same chunk fan-out as the capture session.
//!
//! # Widget States
//!
//! | State | Visual |
//! |-------|--------|
//! | `Idle` | flat lines, record and open buttons, drop hint |
//! | `Capturing` | live waveform, stop button, `3s / 8s` timer |
//! | `Processing` | spinner + file name |
//! | `Result` | dominant emotion, percentage, ranked probabilities |
//! | `Error` | message + dismiss |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::audio::ChunkFanout;
use crate::classify::ClassificationResult;
use crate::config::AppConfig;
use crate::pipeline::{
    mime_for_path, AudioInput, PipelineCommand, PipelineState, SharedState, AUDIO_EXTENSIONS,
};
use crate::visualizer::SpectralVisualizer;

const ACCENT: egui::Color32 = egui::Color32::from_rgb(127, 90, 240);
const ERROR: egui::Color32 = egui::Color32::from_rgb(255, 136, 68);
const DIM: egui::Color32 = egui::Color32::from_rgb(150, 150, 150);

/// Per-frame copy of the shared state, taken under one short lock.
struct Snapshot {
    pipeline: PipelineState,
    recording_secs: f32,
    max_recording_secs: f32,
    pending_file: Option<String>,
    error_message: Option<String>,
    notice: Option<String>,
}

// ---------------------------------------------------------------------------
// EmotionApp
// ---------------------------------------------------------------------------

pub struct EmotionApp {
    state: SharedState,
    command_tx: mpsc::Sender<PipelineCommand>,
    results_rx: mpsc::UnboundedReceiver<ClassificationResult>,
    fanout: Arc<ChunkFanout>,
    visualizer: SpectralVisualizer,

    /// Most recent broadcast result.
    last_result: Option<ClassificationResult>,

    pub config: AppConfig,
}

impl EmotionApp {
    pub fn new(
        state: SharedState,
        command_tx: mpsc::Sender<PipelineCommand>,
        results_rx: mpsc::UnboundedReceiver<ClassificationResult>,
        fanout: Arc<ChunkFanout>,
        config: AppConfig,
    ) -> Self {
        Self {
            state,
            command_tx,
            results_rx,
            fanout,
            visualizer: SpectralVisualizer::mount(&config.visualizer),
            last_result: None,
            config,
        }
    }

    // ── Channel polling ──────────────────────────────────────────────────

    fn poll_results(&mut self) {
        while let Ok(result) = self.results_rx.try_recv() {
            self.last_result = Some(result);
        }
    }

    fn snapshot(&self) -> Snapshot {
        let st = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Snapshot {
            pipeline: st.pipeline,
            recording_secs: st.recording_secs(),
            max_recording_secs: st.max_recording_secs,
            pending_file: st.pending_file.clone(),
            error_message: st.error_message.clone(),
            notice: st.notice.clone(),
        }
    }

    fn send(&self, command: PipelineCommand) {
        if let Err(e) = self.command_tx.try_send(command) {
            log::warn!("ui: pipeline command dropped: {e}");
        }
    }

    fn dismiss(&mut self) {
        if let Ok(mut st) = self.state.lock() {
            st.pipeline = PipelineState::Idle;
            st.error_message = None;
            st.notice = None;
        }
        self.last_result = None;
    }

    // ── Input ────────────────────────────────────────────────────────────

    /// Space toggles capture; a dropped file is submitted unless busy.
    fn handle_input(&mut self, ctx: &egui::Context, pipeline: PipelineState) {
        let (space, dropped) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Space),
                i.raw.dropped_files.first().cloned(),
            )
        });

        if space && pipeline != PipelineState::Processing {
            self.send(PipelineCommand::ToggleCapture);
        }

        let Some(file) = dropped else {
            return;
        };
        if !can_submit(pipeline) {
            log::debug!("ui: ignoring drop while {}", pipeline.label());
            return;
        }

        self.last_result = None;
        if let Some(path) = file.path {
            self.send(PipelineCommand::SubmitFile(path));
        } else if let Some(bytes) = file.bytes {
            let mime = if file.mime.is_empty() {
                mime_for_path(std::path::Path::new(&file.name)).to_string()
            } else {
                file.mime
            };
            self.send(PipelineCommand::Submit(AudioInput::new(
                file.name,
                mime,
                bytes.to_vec(),
            )));
        }
    }

    /// Native open dialog; the chosen path takes the same route as a drop.
    fn open_file(&mut self) {
        let Some(path) = pick_audio_file() else {
            return;
        };
        log::info!("ui: picked {}", path.display());
        self.last_result = None;
        self.send(PipelineCommand::SubmitFile(path));
    }

    // ── Panels ───────────────────────────────────────────────────────────

    fn draw_header(&self, ui: &mut egui::Ui, snap: &Snapshot) {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("Voice Emotion").strong().size(16.0));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new(snap.pipeline.label())
                        .color(state_color(snap.pipeline))
                        .size(12.0),
                );
            });
        });
    }

    /// The waveform canvas.  While live, drawing it also schedules the next
    /// frame through the visualizer's frame loop.
    fn draw_canvas(&mut self, ui: &mut egui::Ui) {
        let size = egui::vec2(ui.available_width(), self.visualizer.height());
        let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());

        let lines = self
            .visualizer
            .frame(ui.ctx(), rect.width(), rect.height());

        let painter = ui.painter_at(rect);
        for line in lines {
            let points: Vec<egui::Pos2> = line
                .points
                .iter()
                .map(|[x, y]| egui::pos2(rect.left() + x, rect.top() + y))
                .collect();
            let [r, g, b, a] = line.color;
            painter.add(egui::Shape::line(
                points,
                egui::Stroke::new(2.0, egui::Color32::from_rgba_unmultiplied(r, g, b, a)),
            ));
        }
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui, snap: &Snapshot) {
        ui.horizontal(|ui| {
            let capturing = snap.pipeline == PipelineState::Capturing;
            let label = if capturing { "Stop" } else { "Record" };
            let button = egui::Button::new(egui::RichText::new(label).size(14.0));

            if ui
                .add_enabled(snap.pipeline != PipelineState::Processing, button)
                .clicked()
            {
                let command = if capturing {
                    PipelineCommand::StopCapture
                } else {
                    PipelineCommand::StartCapture
                };
                self.last_result = None;
                self.send(command);
            }

            if ui
                .add_enabled(can_submit(snap.pipeline), egui::Button::new("Open file…"))
                .clicked()
            {
                self.open_file();
            }

            if capturing {
                ui.label(
                    egui::RichText::new(format!(
                        "{:.0}s / {:.0}s",
                        snap.recording_secs.floor(),
                        snap.max_recording_secs
                    ))
                    .color(egui::Color32::from_rgb(255, 80, 80)),
                );
            }
        });
    }

    fn draw_drop_hint(&self, ui: &mut egui::Ui) {
        let hovering = ui.ctx().input(|i| !i.raw.hovered_files.is_empty());
        let (text, color) = if hovering {
            ("Release to analyze this file", ACCENT)
        } else {
            ("Press Space or Record, or open or drop an audio file (MP3, WAV, M4A, etc.)", DIM)
        };
        ui.label(egui::RichText::new(text).color(color).size(12.0));
    }

    fn draw_processing(&self, ui: &mut egui::Ui, snap: &Snapshot) {
        ui.horizontal(|ui| {
            ui.spinner();
            let name = snap.pending_file.as_deref().unwrap_or("audio");
            ui.label(format!("Analyzing {name}..."));
        });
    }

    fn draw_result(&mut self, ui: &mut egui::Ui) {
        let Some(result) = self.last_result.as_ref() else {
            return;
        };

        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new(capitalize(&result.prediction))
                    .color(ACCENT)
                    .strong()
                    .size(22.0),
            );
            if let Some(pct) = result.dominant_percent() {
                ui.label(egui::RichText::new(format!("{pct}%")).size(18.0));
            }
        });

        ui.add_space(4.0);
        for (label, p) in result.ranked() {
            ui.horizontal(|ui| {
                ui.add_sized([90.0, 16.0], egui::Label::new(capitalize(label)));
                ui.add(
                    egui::ProgressBar::new(p as f32)
                        .desired_width(ui.available_width())
                        .text(format!("{:.1}%", p * 100.0)),
                );
            });
        }

        ui.add_space(4.0);
        if ui.button("Close").clicked() {
            self.dismiss();
        }
    }

    fn draw_error(&mut self, ui: &mut egui::Ui, snap: &Snapshot) {
        let msg = snap.error_message.as_deref().unwrap_or("Something went wrong.");
        ui.label(egui::RichText::new(msg).color(ERROR).size(13.0));
        if ui.button("Dismiss").clicked() {
            self.dismiss();
        }
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for EmotionApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_results();
        let snap = self.snapshot();

        self.visualizer
            .sync(snap.pipeline == PipelineState::Capturing, &self.fanout);
        self.handle_input(ctx, snap.pipeline);

        // The live canvas schedules its own frames; these cover the rest.
        match snap.pipeline {
            PipelineState::Processing => ctx.request_repaint_after(Duration::from_millis(66)),
            _ => ctx.request_repaint_after(Duration::from_millis(250)),
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_header(ui, &snap);
            ui.separator();
            self.draw_canvas(ui);
            ui.separator();
            self.draw_controls(ui, &snap);

            if let Some(notice) = &snap.notice {
                ui.label(egui::RichText::new(notice).color(ERROR).size(12.0));
            }

            match snap.pipeline {
                PipelineState::Idle | PipelineState::Capturing => self.draw_drop_hint(ui),
                PipelineState::Processing => self.draw_processing(ui, &snap),
                PipelineState::Result => self.draw_result(ui),
                PipelineState::Error => self.draw_error(ui, &snap),
            }
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.visualizer.deactivate();
        log::info!("voice emotion widget closing");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Drops and the open dialog are refused while recording or analyzing.
fn can_submit(state: PipelineState) -> bool {
    !state.is_busy()
}

fn pick_audio_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Choose an audio file")
        .add_filter("Audio", AUDIO_EXTENSIONS)
        .pick_file()
}

fn state_color(state: PipelineState) -> egui::Color32 {
    match state {
        PipelineState::Idle => DIM,
        PipelineState::Capturing => egui::Color32::from_rgb(255, 68, 68),
        PipelineState::Processing => egui::Color32::from_rgb(68, 136, 255),
        PipelineState::Result => egui::Color32::from_rgb(80, 200, 120),
        PipelineState::Error => ERROR,
    }
}

/// `"happy"` → `"Happy"`.
fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_labels() {
        assert_eq!(capitalize("happy"), "Happy");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("é"), "É");
    }

    #[test]
    fn file_submission_is_gated_while_busy() {
        assert!(can_submit(PipelineState::Idle));
        assert!(can_submit(PipelineState::Result));
        assert!(can_submit(PipelineState::Error));
        assert!(!can_submit(PipelineState::Capturing));
        assert!(!can_submit(PipelineState::Processing));
    }

    #[test]
    fn every_state_has_a_distinct_colour() {
        let states = [
            PipelineState::Idle,
            PipelineState::Capturing,
            PipelineState::Processing,
            PipelineState::Result,
            PipelineState::Error,
        ];
        for (i, a) in states.iter().enumerate() {
            for b in &states[i + 1..] {
                assert_ne!(state_color(*a), state_color(*b), "{a:?} vs {b:?}");
            }
        }
    }
}
