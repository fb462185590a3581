//! 3D-example gallery: example models with an interactive wireframe preview.

use std::sync::{Arc, Mutex};

use egui::RichText;
use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

use crate::api::ApiClient;
use crate::config::AppConfig;
use crate::download::{Artifact, ArtifactKind};
use crate::mesh::WireMesh;
use crate::renderer;

const WIRE_COLOR: [f32; 3] = [0.86, 0.15, 0.15];

type Loaded = Arc<Mutex<Option<(usize, Result<WireMesh, String>)>>>;

enum Preview {
    Empty,
    Loading,
    Ready { radius: f32, edges: usize },
    Error(String),
}

pub struct ExamplesPage {
    selected: Option<usize>,
    loaded: Loaded,
    preview: Preview,
    rotation: UnitQuaternion<f32>,
    zoom: f32,
    gpu: Option<Arc<renderer::GpuLines>>,
    gpu_failed: bool,
    vertex_storage: Vec<f32>,
    dirty: bool,
}

impl Default for ExamplesPage {
    fn default() -> Self {
        Self {
            selected: None,
            loaded: Arc::new(Mutex::new(None)),
            preview: Preview::Empty,
            rotation: UnitQuaternion::identity(),
            zoom: 1.0,
            gpu: None,
            gpu_failed: false,
            vertex_storage: Vec::new(),
            dirty: false,
        }
    }
}

impl ExamplesPage {
    fn select(&mut self, index: usize, url: String, client: &ApiClient, ctx: &egui::Context) {
        self.selected = Some(index);
        self.preview = Preview::Loading;
        self.rotation = UnitQuaternion::identity();
        self.zoom = 1.0;

        let target = Arc::clone(&self.loaded);
        let client = client.clone();
        let ctx = ctx.clone();
        crate::execute(async move {
            let result = match client.fetch_text(&url).await {
                Ok(text) => WireMesh::from_obj(&text).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Ok(mut slot) = target.lock() {
                *slot = Some((index, result));
            }
            ctx.request_repaint();
        });
    }

    fn take_loaded(&mut self) {
        let Some((index, result)) = self.loaded.lock().ok().and_then(|mut slot| slot.take()) else {
            return;
        };
        if Some(index) != self.selected {
            return;
        }
        self.preview = match result {
            Ok(mesh) => {
                log::info!(
                    "example {index}: {} vertices, {} edges",
                    mesh.positions.len(),
                    mesh.edges.len()
                );
                self.vertex_storage = mesh.vertex_buffer(WIRE_COLOR);
                self.dirty = true;
                Preview::Ready { radius: mesh.radius, edges: mesh.edges.len() }
            }
            Err(e) => {
                log::error!("example {index} failed to load: {e}");
                Preview::Error(e)
            }
        };
    }

    pub fn ui(
        &mut self,
        ui: &mut egui::Ui,
        frame: &eframe::Frame,
        config: &AppConfig,
        client: &ApiClient,
    ) {
        self.take_loaded();
        let ctx = ui.ctx().clone();

        let mut clicked = None;
        egui::SidePanel::left("examples_list")
            .resizable(false)
            .min_width(200.0)
            .show_inside(ui, |ui| {
                ui.heading("3D Examples");
                ui.label("Spectral layouts exported as 3D objects.");
                ui.separator();
                for (i, example) in config.object_examples.iter().enumerate() {
                    if ui
                        .selectable_label(self.selected == Some(i), &example.title)
                        .clicked()
                    {
                        clicked = Some(i);
                    }
                    if !example.description.is_empty() {
                        ui.small(&example.description);
                    }
                }
                if let Some(example) = self.selected.and_then(|i| config.object_examples.get(i)) {
                    ui.separator();
                    if ui.button(ArtifactKind::Object.button_label()).clicked() {
                        Artifact::remote(ArtifactKind::Object, config.asset_url(&example.model)).save();
                    }
                }
            });

        if let Some(i) = clicked.filter(|&i| self.selected != Some(i)) {
            let url = config.asset_url(&config.object_examples[i].model);
            self.select(i, url, client, &ctx);
        }

        egui::CentralPanel::default().show_inside(ui, |ui| match &self.preview {
            Preview::Empty => {
                ui.centered_and_justified(|ui| ui.label("Pick an example on the left."));
            }
            Preview::Loading => {
                ui.centered_and_justified(|ui| ui.spinner());
            }
            Preview::Error(e) => {
                ui.centered_and_justified(|ui| {
                    ui.label(RichText::new(format!("Could not load model: {e}")).color(egui::Color32::RED))
                });
            }
            Preview::Ready { radius, edges } => {
                let (radius, edges) = (*radius, *edges);
                ui.small(format!("{edges} edges · drag to rotate · scroll to zoom"));
                self.viewport(ui, frame, radius);
            }
        });
    }

    fn viewport(&mut self, ui: &mut egui::Ui, frame: &eframe::Frame, radius: f32) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::drag());

        if response.dragged() {
            let delta = response.drag_delta();
            self.rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), delta.x * 0.01)
                * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), delta.y * 0.01)
                * self.rotation;
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll.abs() > 0.0 {
                self.zoom = (self.zoom * (1.0 + scroll * 0.001)).clamp(0.2, 20.0);
            }
        }

        let Some(gl) = frame.gl() else {
            return;
        };
        if self.gpu.is_none() && !self.gpu_failed {
            match unsafe { renderer::GpuLines::new(gl) } {
                Ok(gpu) => self.gpu = Some(Arc::new(gpu)),
                Err(e) => {
                    log::error!("wireframe renderer unavailable: {e}");
                    self.gpu_failed = true;
                }
            }
        }
        let Some(gpu_arc) = &mut self.gpu else {
            return;
        };

        // Upload only while we hold the single strong ref; retried next frame otherwise.
        if self.dirty {
            if let Some(gpu) = Arc::get_mut(gpu_arc) {
                unsafe { gpu.upload_vertices(gl, &self.vertex_storage) };
                self.dirty = false;
            }
        }

        let gpu_for_cb = Arc::clone(gpu_arc);
        let mvp = mvp(&self.rotation, self.zoom, radius, rect);
        let callback = egui_glow::CallbackFn::new(move |_info, painter| unsafe {
            gpu_for_cb.paint(painter.gl(), mvp);
        });
        ui.painter().add(egui::PaintCallback {
            rect,
            callback: Arc::new(callback),
        });
    }

    pub fn destroy(&mut self, gl: Option<&glow::Context>) {
        if let (Some(gl), Some(gpu)) = (gl, self.gpu.take()) {
            unsafe { gpu.destroy(gl) };
        }
    }
}

/// Keeps a model of bounding radius `radius` in front of the camera.
///
/// `zoom` is a dolly factor: 2 halves the camera distance.
pub(crate) fn mvp(rotation: &UnitQuaternion<f32>, zoom: f32, radius: f32, rect: egui::Rect) -> Matrix4<f32> {
    let radius = radius.max(1e-3);
    let distance = radius * 3.0 / zoom;
    let aspect = rect.width() / rect.height().max(1.0);

    let proj = Matrix4::new_perspective(aspect, 60_f32.to_radians(), radius * 0.01, radius * 100.0);
    let view = Matrix4::look_at_rh(
        &Point3::new(0.0, 0.0, distance),
        &Point3::origin(),
        &Vector3::y(),
    );
    proj * view * rotation.to_homogeneous()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;

    fn rect() -> egui::Rect {
        egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(800.0, 600.0))
    }

    #[test]
    fn model_stays_inside_clip_space() {
        let m = mvp(&UnitQuaternion::identity(), 1.0, 5.0, rect());
        let centre = m * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(centre.x.abs() < 1e-5 && centre.y.abs() < 1e-5);
        assert!(centre.w > 0.0);

        let rot = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 1.0);
        let m = mvp(&rot, 1.0, 5.0, rect());
        for corner in [Vector4::new(5.0, 0.0, 0.0, 1.0), Vector4::new(0.0, 5.0, 0.0, 1.0)] {
            let clip = m * corner;
            assert!((clip.x / clip.w).abs() <= 1.0);
            assert!((clip.y / clip.w).abs() <= 1.0);
        }
    }

    #[test]
    fn zoom_moves_the_camera_closer() {
        let point = Vector4::new(0.0, 1.0, 0.0, 1.0);
        let near = mvp(&UnitQuaternion::identity(), 2.0, 5.0, rect()) * point;
        let far = mvp(&UnitQuaternion::identity(), 1.0, 5.0, rect()) * point;
        assert!(near.y / near.w > far.y / far.w);
    }
}
