use crate::components::charts::{sparkline, usage_color};
use crate::metrics::units::format_percent;
use crate::metrics::{MetricsFrame, RateReading, RollingSeriesBuffer, SeriesSet};

struct Card<'a> {
    id: &'a str,
    title: &'a str,
    value: String,
    percent: f64,
    history: Option<&'a RollingSeriesBuffer>,
    scale: f64,
    y_max: Option<f64>,
}

fn show_card(ui: &mut egui::Ui, card: Card<'_>) {
    ui.group(|ui| {
        ui.set_min_width(220.0);
        ui.vertical(|ui| {
            ui.label(egui::RichText::new(card.title).strong());
            ui.label(egui::RichText::new(card.value).heading());
            let fill = usage_color(card.percent, ui.visuals());
            ui.add(
                egui::ProgressBar::new((card.percent / 100.0) as f32)
                    .desired_height(6.0)
                    .fill(fill),
            );
            if let Some(history) = card.history {
                sparkline(ui, ("spark", card.id), history, card.scale, card.y_max);
            }
        });
    });
}

fn rate_card<'a>(
    id: &'a str,
    title: &'a str,
    reading: &RateReading,
    frame: &MetricsFrame,
    history: &'a RollingSeriesBuffer,
) -> Card<'a> {
    Card {
        id,
        title,
        value: frame.unit.format_rate(reading.bytes_per_sec),
        percent: reading.percent,
        history: Some(history),
        scale: frame.unit.divisor(),
        y_max: None,
    }
}

pub fn show_dashboard(ui: &mut egui::Ui, frame: &MetricsFrame, series: &SeriesSet, cpu_model: &str) {
    let gpu_titles: Vec<String> = frame
        .gpus
        .iter()
        .enumerate()
        .map(|(i, gpu)| format!("GPU {i}: {}", gpu.name))
        .collect();
    let gpu_ids: Vec<String> = (0..frame.gpus.len()).map(|i| format!("gpu{i}")).collect();

    let mut cards = vec![
        Card {
            id: "cpu",
            title: "CPU",
            value: format_percent(f64::from(frame.cpu_percent)),
            percent: f64::from(frame.cpu_percent),
            history: Some(&series.cpu),
            scale: 1.0,
            y_max: Some(100.0),
        },
        Card {
            id: "memory",
            title: "Memory",
            value: format_percent(f64::from(frame.memory_percent)),
            percent: f64::from(frame.memory_percent),
            history: Some(&series.memory),
            scale: 1.0,
            y_max: Some(100.0),
        },
        rate_card("net_up", "Network ↑", &frame.network.up, frame, &series.net_up),
        rate_card("net_down", "Network ↓", &frame.network.down, frame, &series.net_down),
        rate_card("disk_read", "Disk read", &frame.disk.read, frame, &series.disk_read),
        rate_card("disk_write", "Disk write", &frame.disk.write, frame, &series.disk_write),
    ];

    for (i, gpu) in frame.gpus.iter().enumerate() {
        cards.push(Card {
            id: &gpu_ids[i],
            title: &gpu_titles[i],
            value: format!("{} · {:.0} °C", format_percent(f64::from(gpu.utilization)), gpu.temperature_c),
            percent: f64::from(gpu.utilization),
            history: series.gpu_utilization.get(i),
            scale: 1.0,
            y_max: Some(100.0),
        });
    }

    if !cpu_model.is_empty() {
        ui.label(egui::RichText::new(cpu_model).weak());
    }
    if frame.gpus.is_empty() {
        ui.label(egui::RichText::new("GPU: N/A").weak());
    }
    ui.add_space(4.0);

    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.horizontal_wrapped(|ui| {
            for card in cards {
                show_card(ui, card);
            }
        });
    });
}
