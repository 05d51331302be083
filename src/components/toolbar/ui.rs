use crate::components::settings::{Settings, REFRESH_INTERVAL_RANGE, SAMPLE_INTERVAL_RANGE};
use crate::metrics::DisplayUnit;

fn interval(ui: &mut egui::Ui, label: &str, value: &mut u64, range: std::ops::RangeInclusive<u64>) {
    ui.label(label);
    ui.add(egui::DragValue::new(value).range(range).speed(10).suffix(" ms"));
}

/// Interval controls, unit selector and pause toggle. Edits `settings` in
/// place; the caller diffs it to apply changes.
pub fn show_toolbar(ui: &mut egui::Ui, settings: &mut Settings, paused: &mut bool) {
    ui.horizontal(|ui| {
        let pause_label = if *paused { "▶ Resume" } else { "⏸ Pause" };
        if ui
            .selectable_label(*paused, pause_label)
            .on_hover_text("P")
            .clicked()
        {
            *paused = !*paused;
        }

        ui.separator();
        interval(ui, "Sample:", &mut settings.sample_interval_ms, SAMPLE_INTERVAL_RANGE);
        interval(ui, "GPU:", &mut settings.gpu_refresh_ms, REFRESH_INTERVAL_RANGE);
        interval(ui, "Processes:", &mut settings.process_refresh_ms, REFRESH_INTERVAL_RANGE);

        ui.separator();
        egui::ComboBox::from_label("Unit")
            .selected_text(settings.display_unit.label())
            .show_ui(ui, |ui| {
                for unit in DisplayUnit::ALL {
                    ui.selectable_value(&mut settings.display_unit, unit, unit.label());
                }
            });
    });
}
