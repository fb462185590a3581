use std::sync::{Arc, Mutex};

use egui::{Color32, RichText};
use futures_channel::mpsc::{self, UnboundedReceiver};
use rfd::AsyncFileDialog;

use crate::api::{ApiClient, OutputSelection, Upload};
use crate::config::{ApiMode, AppConfig};
use crate::download;
use crate::job::{self, EventSink, FlowError, JobEvent, JobTracker, Stage};
use crate::persist;

const ACCENT: Color32 = Color32::from_rgb(220, 38, 38);

enum Action {
    Pick,
    Reset,
}

/// Upload page: pick a matrix, follow the job, download the results.
pub struct DrawPage {
    tracker: JobTracker,
    outputs: OutputSelection,
    picked: Arc<Mutex<Option<Upload>>>,
    events: Option<UnboundedReceiver<JobEvent>>,
}

impl DrawPage {
    pub fn new(ctx: &egui::Context, config: &AppConfig, client: &ApiClient) -> Self {
        let mut page = Self {
            tracker: JobTracker::default(),
            outputs: OutputSelection::default(),
            picked: Arc::new(Mutex::new(None)),
            events: None,
        };
        if config.mode == ApiMode::Jobs {
            if let Some(job_id) = persist::remembered_job() {
                if page.tracker.resume(job_id.clone()) {
                    log::info!("resuming job {job_id}");
                    let sink = page.open_channel(ctx);
                    crate::execute(job::drive_resume(config.clone(), client.clone(), job_id, sink));
                }
            }
        }
        page
    }

    pub fn is_busy(&self) -> bool {
        self.tracker.stage().is_busy()
    }

    /// A fresh channel per run; dropping the old receiver stops its driver.
    fn open_channel(&mut self, ctx: &egui::Context) -> EventSink {
        let (tx, rx) = mpsc::unbounded();
        self.events = Some(rx);
        EventSink::new(tx, ctx.clone())
    }

    fn start(&mut self, ctx: &egui::Context, config: &AppConfig, client: &ApiClient, upload: Upload) {
        if config.mode == ApiMode::Jobs && self.outputs.is_empty() {
            self.report(FlowError::NoOutputs.to_string());
            return;
        }
        match self.tracker.begin(&upload, &config.accept_extension) {
            Ok(()) => {}
            Err(FlowError::Busy) => {
                log::warn!("ignoring {} while busy", upload.file_name);
                return;
            }
            Err(e) => {
                self.report(e.to_string());
                return;
            }
        }

        log::info!("uploading {} ({} bytes)", upload.file_name, upload.bytes.len());
        let sink = self.open_channel(ctx);
        match config.mode {
            ApiMode::Legacy => crate::execute(job::drive_legacy(client.clone(), upload, sink)),
            ApiMode::Jobs => crate::execute(job::drive_job(
                config.clone(),
                client.clone(),
                upload,
                self.outputs,
                sink,
            )),
        }
    }

    fn report(&mut self, message: String) {
        download::alert(&format!("Error: {message}"));
        self.tracker.fail(message);
    }

    fn reset(&mut self) {
        self.events = None;
        self.tracker.reset();
        persist::forget_job();
    }

    /// Apply queued driver events; returns the failures worth alerting.
    fn drain_events(&mut self) -> Vec<String> {
        let mut batch = Vec::new();
        let mut closed = false;
        if let Some(rx) = self.events.as_mut() {
            loop {
                match rx.try_next() {
                    Ok(Some(event)) => batch.push(event),
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_) => break,
                }
            }
        }
        if closed {
            self.events = None;
        }
        let mut alerts = Vec::new();
        for event in batch {
            if let JobEvent::Failed(message) = &event {
                if self.is_busy() {
                    alerts.push(format!("Error: {message}"));
                }
            }
            self.tracker.apply(event);
        }
        alerts
    }

    pub fn ui(&mut self, ui: &mut egui::Ui, config: &AppConfig, client: &ApiClient) {
        let ctx = ui.ctx().clone();

        let picked = self.picked.lock().ok().and_then(|mut slot| slot.take());
        if let Some(upload) = picked {
            self.start(&ctx, config, client, upload);
        }
        for message in self.drain_events() {
            download::alert(&message);
        }

        let mut action = None;
        ui.vertical_centered(|ui| {
            ui.add_space(64.0);
            ui.label(RichText::new("Draw Spectral Graph").size(40.0).strong());
            ui.add_space(8.0);
            ui.label(
                RichText::new(format!(
                    "Upload your .{} file and generate a spectral graph.",
                    config.accept_extension
                ))
                .size(18.0),
            );
            ui.add_space(36.0);

            match self.tracker.stage() {
                Stage::Idle => {
                    if config.mode == ApiMode::Jobs {
                        ui.horizontal(|ui| {
                            ui.label("Generate:");
                            ui.checkbox(&mut self.outputs.image, "Image");
                            ui.checkbox(&mut self.outputs.object, "3D object");
                        });
                        ui.add_space(12.0);
                    }
                    let button = egui::Button::new(
                        RichText::new(format!("Select .{} File", config.accept_extension))
                            .size(22.0)
                            .color(Color32::WHITE),
                    )
                    .fill(ACCENT)
                    .rounding(12.0)
                    .min_size(egui::vec2(260.0, 64.0));
                    if ui.add(button).clicked() {
                        action = Some(Action::Pick);
                    }
                }
                Stage::Uploading { file_name } => {
                    ui.spinner();
                    ui.label(format!("Uploading {file_name}… Please wait."));
                }
                Stage::Processing { job_id, state, attempts } => {
                    ui.spinner();
                    ui.label(format!("Processing… Please wait. Job {job_id} is {}.", state.label()));
                    if *attempts > 0 {
                        ui.small(format!("status checks: {attempts}"));
                    }
                }
                Stage::Completed { artifacts } => {
                    for artifact in artifacts {
                        let button = egui::Button::new(
                            RichText::new(artifact.kind.button_label()).size(20.0).color(Color32::WHITE),
                        )
                        .fill(Color32::from_rgb(22, 163, 74))
                        .rounding(10.0)
                        .min_size(egui::vec2(240.0, 52.0));
                        if ui.add(button).on_hover_text(artifact.file_name()).clicked() {
                            artifact.save();
                        }
                        ui.add_space(8.0);
                    }
                    ui.add_space(16.0);
                    if ui.button("Draw another graph").clicked() {
                        action = Some(Action::Reset);
                    }
                }
                Stage::Failed { message } => {
                    ui.colored_label(ACCENT, format!("Error: {message}"));
                    ui.add_space(12.0);
                    if ui.button("Try again").clicked() {
                        action = Some(Action::Reset);
                    }
                }
            }
        });

        match action {
            Some(Action::Pick) => {
                spawn_file_picker(Arc::clone(&self.picked), config.accept_extension.clone(), ctx);
            }
            Some(Action::Reset) => self.reset(),
            None => {}
        }
    }
}

fn spawn_file_picker(target: Arc<Mutex<Option<Upload>>>, extension: String, ctx: egui::Context) {
    crate::execute(async move {
        let Some(handle) = AsyncFileDialog::new()
            .add_filter("Matrix Market", &[extension.as_str()])
            .pick_file()
            .await
        else {
            log::debug!("file selection cancelled");
            return;
        };
        let upload = Upload {
            file_name: handle.file_name(),
            bytes: handle.read().await,
        };
        if let Ok(mut slot) = target.lock() {
            *slot = Some(upload);
        }
        ctx.request_repaint();
    });
}
