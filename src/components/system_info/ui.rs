use crate::metrics::units::format_gib;
use crate::metrics::SystemInfo;

fn row(ui: &mut egui::Ui, label: &str, value: impl Into<egui::WidgetText>) {
    ui.label(egui::RichText::new(label).strong());
    ui.label(value);
    ui.end_row();
}

pub fn show_system_info(ui: &mut egui::Ui, info: &SystemInfo) {
    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.heading("CPU");
        egui::Grid::new("info_cpu").num_columns(2).show(ui, |ui| {
            row(ui, "Model", info.cpu_model.as_str());
            row(ui, "Logical cores", info.logical_cores.to_string());
            row(ui, "Architecture", info.arch.as_str());
        });

        ui.separator();
        ui.heading("Operating system");
        egui::Grid::new("info_os").num_columns(2).show(ui, |ui| {
            row(ui, "Name", info.os_name.as_str());
            row(ui, "Version", info.os_version.as_str());
            row(ui, "Kernel", info.kernel_version.as_str());
            row(ui, "Host", info.host_name.as_str());
        });

        ui.separator();
        ui.heading("Memory");
        egui::Grid::new("info_memory").num_columns(2).show(ui, |ui| {
            row(ui, "Total", format_gib(info.total_memory));
            row(ui, "Available", format_gib(info.available_memory));
            row(ui, "Swap", format_gib(info.total_swap));
        });

        ui.separator();
        ui.heading("Disks");
        if info.disks.is_empty() {
            ui.label("N/A");
        }
        egui::Grid::new("info_disks")
            .num_columns(4)
            .striped(true)
            .show(ui, |ui| {
                for disk in &info.disks {
                    ui.label(&disk.mount_point);
                    ui.label(&disk.file_system);
                    ui.label(format!(
                        "{} free of {}",
                        format_gib(disk.available_bytes),
                        format_gib(disk.total_bytes)
                    ));
                    ui.add(
                        egui::ProgressBar::new((disk.used_percent() / 100.0) as f32)
                            .desired_width(120.0)
                            .show_percentage(),
                    );
                    ui.end_row();
                }
            });

        ui.separator();
        ui.heading("GPU");
        if info.gpus.is_empty() {
            ui.label("N/A");
        }
        for (i, name) in info.gpus.iter().enumerate() {
            ui.label(format!("GPU {i}: {name}"));
        }
    });
}
