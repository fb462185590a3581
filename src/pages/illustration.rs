use egui::RichText;

use crate::config::AppConfig;

const IMAGE_WIDTH: f32 = 280.0;

pub fn show(ui: &mut egui::Ui, config: &AppConfig) {
    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(32.0);
            ui.label(RichText::new("Illustration").size(34.0).strong());
            ui.add_space(6.0);
            ui.label(
                RichText::new("Below are some example graphs generated from sample .mtx files.")
                    .size(17.0),
            );
            ui.add_space(24.0);
        });

        ui.horizontal_wrapped(|ui| {
            ui.spacing_mut().item_spacing = egui::vec2(24.0, 24.0);
            for image in &config.illustrations {
                ui.vertical(|ui| {
                    ui.set_width(IMAGE_WIDTH);
                    ui.add(
                        egui::Image::new(config.asset_url(&image.src))
                            .max_width(IMAGE_WIDTH)
                            .rounding(8.0)
                            .show_loading_spinner(true),
                    )
                    .on_hover_text(&image.src);
                    ui.vertical_centered(|ui| ui.label(&image.caption));
                });
            }
        });
    });
}
