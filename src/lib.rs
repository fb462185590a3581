pub mod api;
pub mod config;
pub mod download;
pub mod job;
pub mod mesh;
pub mod pages;
pub mod persist;
mod renderer;

use eframe::egui;
use std::future::Future;

use api::ApiClient;
use config::AppConfig;
use pages::{draw::DrawPage, examples::ExamplesPage, Page, Router};

pub struct SpectralApp {
    config: AppConfig,
    client: ApiClient,
    router: Router,
    draw: DrawPage,
    examples: ExamplesPage,
}

impl SpectralApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        egui_extras::install_image_loaders(&cc.egui_ctx);

        let config = AppConfig::load();
        let client = ApiClient::new(&config);
        let draw = DrawPage::new(&cc.egui_ctx, &config, &client);

        Self {
            config,
            client,
            router: Router::new(&cc.egui_ctx),
            draw,
            examples: ExamplesPage::default(),
        }
    }
}

impl eframe::App for SpectralApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        self.router.sync_from_location();

        egui::TopBottomPanel::top("nav").show(ctx, |ui| {
            ui.add_space(4.0);
            self.router.nav_bar(ui);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.router.page() {
            Page::Draw => self.draw.ui(ui, &self.config, &self.client),
            Page::Illustration => pages::illustration::show(ui, &self.config),
            Page::Examples => self.examples.ui(ui, frame, &self.config, &self.client),
        });
    }

    fn on_exit(&mut self, gl: Option<&glow::Context>) {
        self.examples.destroy(gl);
    }
}

// ── Web entry‑point ──
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Id of the `<canvas>` in `index.html`.
#[cfg(target_arch = "wasm32")]
const CANVAS_ID: &str = "spectral_canvas";

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    use wasm_bindgen::JsCast;

    // Redirect `log` macros & panic messages to the browser console
    eframe::WebLogger::init(log::LevelFilter::Debug).ok();
    console_error_panic_hook::set_once();

    let canvas = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(CANVAS_ID))
        .ok_or_else(|| JsValue::from_str("canvas element missing"))?
        .dyn_into::<web_sys::HtmlCanvasElement>()?;

    eframe::WebRunner::new()
        .start(
            canvas,
            eframe::WebOptions::default(),
            Box::new(|cc| Ok(Box::new(SpectralApp::new(cc)))),
        )
        .await?;

    Ok(())
}

// ── Native entry‑point ──
#[cfg(not(target_arch = "wasm32"))]
pub fn run_native() -> eframe::Result<()> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Spectral Graph",
        options,
        Box::new(|cc| Ok(Box::new(SpectralApp::new(cc)))),
    )
}

// Executes an async future without blocking the egui thread
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn execute<F: Future<Output = ()> + Send + 'static>(f: F) {
    std::thread::spawn(move || futures::executor::block_on(f));
}
#[cfg(target_arch = "wasm32")]
pub(crate) fn execute<F: Future<Output = ()> + 'static>(f: F) {
    wasm_bindgen_futures::spawn_local(f);
}
