#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result<()> {
    spectral_draw_ui::run_native()
}

// The web build starts from `#[wasm_bindgen(start)]` in the library.
#[cfg(target_arch = "wasm32")]
fn main() {}
