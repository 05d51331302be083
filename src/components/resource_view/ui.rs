use crate::components::charts::{percent_plot, series_plot, usage_color, PlotSeries};
use crate::metrics::units::format_percent;
use crate::metrics::{MetricsFrame, SeriesSet};

const CHART_HEIGHT: f32 = 220.0;
const CORE_CHART_HEIGHT: f32 = 70.0;
const CORE_COLUMNS: usize = 4;

pub fn show_cpu(ui: &mut egui::Ui, frame: &MetricsFrame, series: &SeriesSet, cpu_model: &str) {
    ui.heading(format!("CPU {}", format_percent(f64::from(frame.cpu_percent))));
    if !cpu_model.is_empty() {
        ui.label(cpu_model);
    }
    percent_plot(ui, "cpu_total", CHART_HEIGHT, &[PlotSeries::new("CPU %", &series.cpu)]);

    ui.separator();
    ui.label(format!("{} logical cores", series.per_core.len()));

    egui::ScrollArea::vertical().show(ui, |ui| {
        egui::Grid::new("per_core_grid")
            .num_columns(CORE_COLUMNS)
            .spacing([8.0, 8.0])
            .show(ui, |ui| {
                for (core, buffer) in series.per_core.iter().enumerate() {
                    ui.vertical(|ui| {
                        ui.set_width(180.0);
                        let usage = frame.per_core_percent.get(core).copied().unwrap_or(0.0);
                        let mut caption = format!("Core {core}: {}", format_percent(f64::from(usage)));
                        if let Some(mhz) = frame.per_core_frequency_mhz.get(core).filter(|mhz| **mhz > 0) {
                            caption.push_str(&format!(" @ {mhz} MHz"));
                        }
                        ui.label(egui::RichText::new(caption).small());
                        percent_plot(
                            ui,
                            ("core_plot", core),
                            CORE_CHART_HEIGHT,
                            &[PlotSeries::new(format!("Core {core}"), buffer)],
                        );
                    });
                    if (core + 1) % CORE_COLUMNS == 0 {
                        ui.end_row();
                    }
                }
            });
    });
}

pub fn show_memory(ui: &mut egui::Ui, frame: &MetricsFrame, series: &SeriesSet) {
    let percent = f64::from(frame.memory_percent);
    ui.heading(format!("Memory {}", format_percent(percent)));
    ui.add(
        egui::ProgressBar::new((percent / 100.0) as f32)
            .show_percentage()
            .fill(usage_color(percent, ui.visuals())),
    );
    percent_plot(ui, "memory", CHART_HEIGHT, &[PlotSeries::new("Memory %", &series.memory)]);
}

pub fn show_network(ui: &mut egui::Ui, frame: &MetricsFrame, series: &SeriesSet) {
    let unit = frame.unit;
    ui.heading("Network");
    ui.horizontal(|ui| {
        ui.label(format!("↑ {}", unit.format_rate(frame.network.up.bytes_per_sec)));
        ui.add_space(16.0);
        ui.label(format!("↓ {}", unit.format_rate(frame.network.down.bytes_per_sec)));
    });
    series_plot(
        ui,
        "network",
        CHART_HEIGHT,
        &[
            PlotSeries::rate(format!("Up ({})", unit.label()), &series.net_up, unit),
            PlotSeries::rate(format!("Down ({})", unit.label()), &series.net_down, unit),
        ],
        None,
    );
}

pub fn show_disk(ui: &mut egui::Ui, frame: &MetricsFrame, series: &SeriesSet) {
    let unit = frame.unit;
    ui.heading("Disk I/O");
    ui.horizontal(|ui| {
        ui.label(format!("Read {}", unit.format_rate(frame.disk.read.bytes_per_sec)));
        ui.add_space(16.0);
        ui.label(format!("Write {}", unit.format_rate(frame.disk.write.bytes_per_sec)));
    });
    series_plot(
        ui,
        "disk",
        CHART_HEIGHT,
        &[
            PlotSeries::rate(format!("Read ({})", unit.label()), &series.disk_read, unit),
            PlotSeries::rate(format!("Write ({})", unit.label()), &series.disk_write, unit),
        ],
        None,
    );
}

pub fn show_gpu(ui: &mut egui::Ui, frame: &MetricsFrame, series: &SeriesSet, backend: &str) {
    ui.heading("GPU");
    if frame.gpus.is_empty() {
        ui.label("N/A: no supported GPU or driver tool found.");
        return;
    }
    ui.label(egui::RichText::new(format!("via {backend}")).weak());

    egui::ScrollArea::vertical().show(ui, |ui| {
        for (i, gpu) in frame.gpus.iter().enumerate() {
            egui::CollapsingHeader::new(format!("GPU {i}: {}", gpu.name))
                .default_open(true)
                .show(ui, |ui| {
                    egui::Grid::new(("gpu_facts", i)).num_columns(2).show(ui, |ui| {
                        ui.label("Utilization");
                        ui.label(format_percent(f64::from(gpu.utilization)));
                        ui.end_row();
                        ui.label("VRAM");
                        ui.label(format!("{:.0} / {:.0} MB", gpu.vram_used_mb, gpu.vram_total_mb));
                        ui.end_row();
                        ui.label("Clock");
                        ui.label(format!("{:.0} MHz", gpu.frequency_mhz));
                        ui.end_row();
                        ui.label("Temperature");
                        ui.label(format!("{:.0} °C", gpu.temperature_c));
                        ui.end_row();
                    });

                    if let (Some(util), Some(vram)) =
                        (series.gpu_utilization.get(i), series.gpu_vram.get(i))
                    {
                        percent_plot(
                            ui,
                            ("gpu_plot", i),
                            CHART_HEIGHT * 0.6,
                            &[PlotSeries::new("Utilization %", util), PlotSeries::new("VRAM %", vram)],
                        );
                    }
                    if let Some(temps) = series.gpu_temperature.get(i) {
                        series_plot(
                            ui,
                            ("gpu_temp", i),
                            CHART_HEIGHT * 0.4,
                            &[PlotSeries::new("°C", temps)],
                            Some(100.0),
                        );
                    }
                });
        }
    });
}
