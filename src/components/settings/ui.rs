use super::state::{Settings, HISTORY_LEN_RANGE};

pub fn show_settings_window(ctx: &egui::Context, settings: &mut Settings) {
    if !settings.is_visible() {
        return;
    }

    egui::Window::new("⚙ Settings")
        .collapsible(false)
        .resizable(false)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("UI Scale:");
                ui.add(egui::Slider::new(&mut settings.scale, 0.5..=2.0).step_by(0.1));
            });

            ui.horizontal(|ui| {
                ui.label("Font Size:");
                ui.add(egui::Slider::new(&mut settings.font_size, 8.0..=32.0).step_by(1.0));
            });

            ui.separator();

            egui::Grid::new("history_settings")
                .num_columns(2)
                .spacing([16.0, 4.0])
                .show(ui, |ui| {
                    ui.label("Chart history (points):");
                    ui.add(
                        egui::DragValue::new(&mut settings.history_len)
                            .range(HISTORY_LEN_RANGE)
                            .speed(10),
                    );
                    ui.end_row();

                    ui.label("Per-core history (points):");
                    ui.add(
                        egui::DragValue::new(&mut settings.core_history_len)
                            .range(HISTORY_LEN_RANGE)
                            .speed(10),
                    );
                    ui.end_row();

                    ui.label("nvidia-smi poll (ms):");
                    ui.add(
                        egui::DragValue::new(&mut settings.gpu_poll_ms)
                            .range(100..=10_000)
                            .speed(50),
                    )
                    .on_hover_text("Takes effect on restart");
                    ui.end_row();
                });

            ui.label(
                egui::RichText::new("Changing history length clears the charts.")
                    .small()
                    .weak(),
            );

            ui.separator();

            if ui.button("Close").clicked() {
                settings.hide();
            }
        });
}
