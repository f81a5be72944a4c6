//! egui application: upload area, preview panes, controls, and toasts.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use client_core::{InputSummary, NoticeKind, ResultMetadata};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::domain::format_size_mib;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;
use crate::controller::orchestration::dispatch_backend_command;
use crate::media::PreviewImage;

const TOAST_VISIBLE: Duration = Duration::from_secs(5);
const TOAST_FADE: Duration = Duration::from_millis(300);

const PREVIEW_MAX_SIZE: f32 = 380.0;
const UPLOAD_AREA_HEIGHT: f32 = 150.0;

struct Toast {
    kind: NoticeKind,
    message: String,
    shown_at: Instant,
}

impl Toast {
    fn new(kind: NoticeKind, message: String) -> Self {
        Self {
            kind,
            message,
            shown_at: Instant::now(),
        }
    }

    /// Render opacity at `now`: fully visible for [`TOAST_VISIBLE`], fading
    /// out over [`TOAST_FADE`], then `None` once gone.
    fn opacity(&self, now: Instant) -> Option<f32> {
        let elapsed = now.duration_since(self.shown_at);
        if elapsed < TOAST_VISIBLE {
            Some(1.0)
        } else if elapsed < TOAST_VISIBLE + TOAST_FADE {
            let fade = (elapsed - TOAST_VISIBLE).as_secs_f32() / TOAST_FADE.as_secs_f32();
            Some(1.0 - fade)
        } else {
            None
        }
    }
}

struct SourcePane {
    summary: InputSummary,
    image: Option<PreviewImage>,
    texture: Option<egui::TextureHandle>,
}

struct ResultPane {
    metadata: ResultMetadata,
    image: Option<PreviewImage>,
    texture: Option<egui::TextureHandle>,
}

fn load_preview_texture(
    ctx: &egui::Context,
    name: &str,
    image: &PreviewImage,
) -> egui::TextureHandle {
    let color_image =
        egui::ColorImage::from_rgba_unmultiplied([image.width, image.height], &image.rgba);
    ctx.load_texture(name.to_string(), color_image, egui::TextureOptions::LINEAR)
}

pub struct CutoutApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,

    worker_ready: bool,
    fatal: Option<String>,

    source: Option<SourcePane>,
    result: Option<ResultPane>,
    processing: bool,
    process_enabled: bool,
    download_enabled: bool,

    drop_hover: bool,
    toast: Option<Toast>,
    status: String,
}

impl CutoutApp {
    pub fn new(cmd_tx: Sender<BackendCommand>, ui_rx: Receiver<UiEvent>) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            worker_ready: false,
            fatal: None,
            source: None,
            result: None,
            processing: false,
            process_enabled: false,
            download_enabled: false,
            drop_hover: false,
            toast: None,
            status: "Starting backend worker...".to_string(),
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::WorkerReady => {
                    self.worker_ready = true;
                    self.status = "Drop an image or click the upload area".to_string();
                }
                UiEvent::Fatal { message } => {
                    self.fatal = Some(message);
                }
                UiEvent::SourcePreviewLoaded { summary, image } => {
                    self.source = Some(SourcePane {
                        summary,
                        image,
                        texture: None,
                    });
                    // A new selection supersedes any previous result display.
                    self.result = None;
                    self.status = "Ready to process".to_string();
                }
                UiEvent::ResultPreviewLoaded { metadata, image } => {
                    self.result = Some(ResultPane {
                        metadata,
                        image,
                        texture: None,
                    });
                    self.processing = false;
                    self.status = "Done".to_string();
                }
                UiEvent::ProcessingFailed { message } => {
                    self.processing = false;
                    self.status = message;
                }
                UiEvent::ControlsChanged {
                    process_enabled,
                    download_enabled,
                } => {
                    self.process_enabled = process_enabled;
                    self.download_enabled = download_enabled;
                    if process_enabled {
                        self.processing = false;
                    }
                }
                UiEvent::SessionCleared => {
                    self.source = None;
                    self.result = None;
                    self.processing = false;
                    self.status = "Session reset".to_string();
                }
                UiEvent::Toast { kind, message } => {
                    self.toast = Some(Toast::new(kind, message));
                }
            }
        }
    }

    fn request_select(&mut self, path: PathBuf) {
        dispatch_backend_command(
            &self.cmd_tx,
            BackendCommand::SelectFile { path },
            &mut self.status,
        );
    }

    fn pick_file(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Images", &["jpg", "jpeg", "png", "webp"])
            .pick_file();
        if let Some(path) = picked {
            self.request_select(path);
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        self.drop_hover = ctx.input(|i| !i.raw.hovered_files.is_empty());
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(path) = dropped.into_iter().find_map(|file| file.path) {
            self.request_select(path);
        }
    }

    fn show_fatal_banner(&self, ui: &mut egui::Ui) {
        let Some(message) = &self.fatal else { return };
        egui::Frame::none()
            .fill(egui::Color32::from_rgb(111, 53, 53))
            .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(175, 96, 96)))
            .rounding(8.0)
            .inner_margin(egui::Margin::symmetric(10.0, 8.0))
            .show(ui, |ui| {
                ui.label(egui::RichText::new(message).color(egui::Color32::WHITE));
            });
        ui.add_space(8.0);
    }

    fn show_upload_area(&mut self, ui: &mut egui::Ui) {
        let desired = egui::vec2(ui.available_width(), UPLOAD_AREA_HEIGHT);
        let (rect, response) = ui.allocate_exact_size(desired, egui::Sense::click());

        let active = response.hovered() || self.drop_hover;
        let fill = if active {
            ui.visuals().faint_bg_color.gamma_multiply(1.4)
        } else {
            ui.visuals().faint_bg_color
        };
        let stroke_color = if active {
            ui.visuals().selection.bg_fill
        } else {
            ui.visuals().widgets.noninteractive.bg_stroke.color
        };

        let painter = ui.painter();
        painter.rect(rect, 12.0, fill, egui::Stroke::new(1.5, stroke_color));
        painter.text(
            rect.center() - egui::vec2(0.0, 12.0),
            egui::Align2::CENTER_CENTER,
            "Drop an image here or click to browse",
            egui::FontId::proportional(16.0),
            ui.visuals().strong_text_color(),
        );
        painter.text(
            rect.center() + egui::vec2(0.0, 14.0),
            egui::Align2::CENTER_CENTER,
            "JPG, PNG, or WEBP up to 5MB",
            egui::FontId::proportional(12.0),
            ui.visuals().weak_text_color(),
        );

        if response.clicked() {
            self.pick_file();
        }
    }

    fn show_preview_image(
        ui: &mut egui::Ui,
        texture: Option<&egui::TextureHandle>,
        unavailable_text: &str,
    ) {
        match texture {
            Some(texture) => {
                ui.add(
                    egui::Image::new(texture)
                        .max_size(egui::vec2(PREVIEW_MAX_SIZE, PREVIEW_MAX_SIZE)),
                );
            }
            None => {
                ui.weak(unavailable_text);
            }
        }
    }

    fn show_source_pane(&mut self, ui: &mut egui::Ui) {
        ui.strong("Original");
        ui.add_space(4.0);
        let Some(pane) = self.source.as_mut() else {
            ui.weak("No image selected");
            return;
        };

        if pane.texture.is_none() {
            if let Some(image) = &pane.image {
                pane.texture = Some(load_preview_texture(ui.ctx(), "source-preview", image));
            }
        }
        Self::show_preview_image(ui, pane.texture.as_ref(), "Preview unavailable");

        ui.add_space(6.0);
        ui.small("Click process to see details");
        ui.small(format_size_mib(pane.summary.byte_len));
        ui.small(pane.summary.format.label());
    }

    fn show_result_pane(&mut self, ui: &mut egui::Ui) {
        ui.strong("Processed");
        ui.add_space(4.0);

        if self.processing {
            ui.add(egui::Spinner::new().size(28.0));
            ui.weak("Removing background...");
            return;
        }

        let Some(pane) = self.result.as_mut() else {
            ui.weak("Processed image will appear here");
            return;
        };

        if pane.texture.is_none() {
            if let Some(image) = &pane.image {
                pane.texture = Some(load_preview_texture(ui.ctx(), "result-preview", image));
            }
        }
        Self::show_preview_image(ui, pane.texture.as_ref(), "Preview unavailable");

        ui.add_space(6.0);
        match pane.metadata.dimensions {
            Some((width, height)) => ui.small(format!("{width} x {height}")),
            None => ui.small("Dimensions unavailable"),
        };
        ui.small(format_size_mib(pane.metadata.byte_len));
        ui.small(pane.metadata.format_label);
    }

    fn show_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let can_process = self.worker_ready
                && !self.processing
                && self.process_enabled
                && self.source.is_some();
            if ui
                .add_enabled(can_process, egui::Button::new("Remove Background"))
                .clicked()
            {
                self.processing = true;
                dispatch_backend_command(&self.cmd_tx, BackendCommand::Process, &mut self.status);
            }

            let can_download = self.worker_ready
                && !self.processing
                && self.download_enabled
                && self.result.is_some();
            if ui
                .add_enabled(can_download, egui::Button::new("Download"))
                .clicked()
            {
                dispatch_backend_command(&self.cmd_tx, BackendCommand::Download, &mut self.status);
            }

            if ui
                .add_enabled(self.worker_ready, egui::Button::new("Reset"))
                .clicked()
            {
                dispatch_backend_command(&self.cmd_tx, BackendCommand::Reset, &mut self.status);
            }
        });
    }

    fn show_toast(&mut self, ctx: &egui::Context) {
        if self.toast.is_none() {
            return;
        }

        let now = Instant::now();
        let rendered = self
            .toast
            .as_ref()
            .and_then(|toast| {
                toast
                    .opacity(now)
                    .map(|opacity| (toast.kind, toast.message.clone(), opacity))
            });
        let Some((kind, message, opacity)) = rendered else {
            self.toast = None;
            return;
        };

        let (fill, stroke) = match kind {
            NoticeKind::Success => (
                egui::Color32::from_rgb(46, 102, 63),
                egui::Color32::from_rgb(88, 164, 110),
            ),
            NoticeKind::Error => (
                egui::Color32::from_rgb(111, 53, 53),
                egui::Color32::from_rgb(175, 96, 96),
            ),
        };

        egui::Area::new(egui::Id::new("notification_toast"))
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-16.0, -16.0))
            .order(egui::Order::Foreground)
            .interactable(false)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .fill(fill.gamma_multiply(opacity))
                    .stroke(egui::Stroke::new(1.0, stroke.gamma_multiply(opacity)))
                    .rounding(8.0)
                    .inner_margin(egui::Margin::symmetric(12.0, 8.0))
                    .show(ui, |ui| {
                        ui.label(
                            egui::RichText::new(message)
                                .color(egui::Color32::WHITE.gamma_multiply(opacity)),
                        );
                    });
            });

        // Keep repainting while the toast counts down.
        ctx.request_repaint_after(Duration::from_millis(50));
    }
}

impl eframe::App for CutoutApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();
        self.handle_dropped_files(ctx);

        if self.processing {
            // The spinner animates while the request is in flight.
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Cutout");
            ui.weak("Remove image backgrounds in one click.");
            ui.add_space(8.0);

            self.show_fatal_banner(ui);
            self.show_upload_area(ui);
            ui.add_space(12.0);

            if self.source.is_some() {
                ui.columns(2, |columns| {
                    self.show_source_pane(&mut columns[0]);
                    self.show_result_pane(&mut columns[1]);
                });
                ui.add_space(12.0);
            }

            self.show_controls(ui);

            ui.add_space(10.0);
            ui.separator();
            ui.horizontal_wrapped(|ui| {
                ui.small("Status:");
                ui.small(egui::RichText::new(&self.status).weak());
            });
        });

        self.show_toast(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn app_with_events(events: Vec<UiEvent>) -> CutoutApp {
        let (cmd_tx, _cmd_rx) = bounded::<BackendCommand>(8);
        let (ui_tx, ui_rx) = bounded::<UiEvent>(32);
        for event in events {
            ui_tx.try_send(event).expect("queue event");
        }
        let mut app = CutoutApp::new(cmd_tx, ui_rx);
        app.process_ui_events();
        app
    }

    fn sample_summary() -> InputSummary {
        InputSummary {
            file_name: "photo.png".into(),
            media_type: "image/png".into(),
            byte_len: 1024,
            format: shared::domain::ImageFormat::Png,
        }
    }

    #[test]
    fn toast_is_fully_visible_then_fades_then_expires() {
        let toast = Toast::new(NoticeKind::Success, "ok".into());
        let start = toast.shown_at;

        assert_eq!(toast.opacity(start + Duration::from_secs(1)), Some(1.0));

        let mid_fade = toast
            .opacity(start + TOAST_VISIBLE + TOAST_FADE / 2)
            .expect("still fading");
        assert!(mid_fade > 0.0 && mid_fade < 1.0);

        assert_eq!(
            toast.opacity(start + TOAST_VISIBLE + TOAST_FADE + Duration::from_millis(1)),
            None
        );
    }

    #[test]
    fn source_preview_replaces_previous_result_display() {
        let mut app = app_with_events(vec![
            UiEvent::WorkerReady,
            UiEvent::SourcePreviewLoaded {
                summary: sample_summary(),
                image: None,
            },
            UiEvent::ResultPreviewLoaded {
                metadata: ResultMetadata {
                    dimensions: Some((2, 2)),
                    byte_len: 64,
                    format_label: "PNG",
                },
                image: None,
            },
        ]);
        assert!(app.source.is_some());
        assert!(app.result.is_some());

        let (ui_tx, ui_rx) = bounded::<UiEvent>(8);
        app.ui_rx = ui_rx;
        ui_tx
            .try_send(UiEvent::SourcePreviewLoaded {
                summary: sample_summary(),
                image: None,
            })
            .expect("queue event");
        app.process_ui_events();

        assert!(app.source.is_some());
        assert!(app.result.is_none());
    }

    #[test]
    fn controls_re_enable_clears_the_processing_flag() {
        let mut app = app_with_events(vec![UiEvent::WorkerReady]);
        app.processing = true;

        let (ui_tx, ui_rx) = bounded::<UiEvent>(8);
        app.ui_rx = ui_rx;
        ui_tx
            .try_send(UiEvent::ControlsChanged {
                process_enabled: true,
                download_enabled: false,
            })
            .expect("queue event");
        app.process_ui_events();

        assert!(!app.processing);
        assert!(app.process_enabled);
        assert!(!app.download_enabled);
    }

    #[test]
    fn session_cleared_empties_both_panes() {
        let mut app = app_with_events(vec![
            UiEvent::SourcePreviewLoaded {
                summary: sample_summary(),
                image: None,
            },
            UiEvent::SessionCleared,
        ]);
        assert!(app.source.is_none());
        assert!(app.result.is_none());
        assert!(!app.processing);
    }
}
