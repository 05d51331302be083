use egui::Vec2;
use egui_plot::{Legend, Line, Plot, PlotPoints};

use crate::metrics::{DisplayUnit, RollingSeriesBuffer};

/// Points shown by dashboard sparklines.
pub const SPARKLINE_POINTS: usize = 60;

/// One line of a chart; `scale` divides each stored value.
pub struct PlotSeries<'a> {
    pub name: String,
    pub buffer: &'a RollingSeriesBuffer,
    pub scale: f64,
}

impl<'a> PlotSeries<'a> {
    pub fn new(name: impl Into<String>, buffer: &'a RollingSeriesBuffer) -> Self {
        Self {
            name: name.into(),
            buffer,
            scale: 1.0,
        }
    }

    /// A byte-rate series plotted in `unit`.
    pub fn rate(name: impl Into<String>, buffer: &'a RollingSeriesBuffer, unit: DisplayUnit) -> Self {
        Self {
            name: name.into(),
            buffer,
            scale: unit.divisor(),
        }
    }

    fn points(&self) -> PlotPoints {
        self.buffer
            .snapshot()
            .into_iter()
            .map(|(index, value)| [index as f64, value / self.scale])
            .collect()
    }

    fn max(&self) -> f64 {
        self.buffer.max_value().unwrap_or(0.0) / self.scale
    }
}

/// Y-axis top for series without a natural maximum.
pub fn auto_scale_max(series: &[PlotSeries<'_>]) -> f64 {
    let max = series.iter().map(PlotSeries::max).fold(0.0, f64::max);
    (max * 1.2).max(1.0)
}

/// Scrolling time-series chart. `y_max` of `None` auto-scales.
pub fn series_plot(
    ui: &mut egui::Ui,
    id: impl std::hash::Hash,
    height: f32,
    series: &[PlotSeries<'_>],
    y_max: Option<f64>,
) {
    let Some(first) = series.first() else {
        return;
    };
    let y_max = y_max.unwrap_or_else(|| auto_scale_max(series));
    let (start, end) = first.buffer.window_bounds();
    let mut plot = Plot::new(id)
        .height(height)
        .show_axes(true)
        .set_margin_fraction(Vec2::ZERO)
        .include_x(start as f64)
        .include_x(end as f64)
        .include_y(0.0)
        .include_y(y_max)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .allow_double_click_reset(false);
    if series.len() > 1 {
        plot = plot.legend(Legend::default());
    }

    plot.show(ui, |plot_ui| {
        for line in series {
            plot_ui.line(Line::new(line.points()).name(&line.name));
        }
    });
}

pub fn percent_plot(ui: &mut egui::Ui, id: impl std::hash::Hash, height: f32, series: &[PlotSeries<'_>]) {
    series_plot(ui, id, height, series, Some(100.0));
}

/// Axis-less plot of the last `SPARKLINE_POINTS` samples.
pub fn sparkline(
    ui: &mut egui::Ui,
    id: impl std::hash::Hash,
    buffer: &RollingSeriesBuffer,
    scale: f64,
    y_max: Option<f64>,
) {
    let points: Vec<[f64; 2]> = buffer
        .iter()
        .skip(buffer.len().saturating_sub(SPARKLINE_POINTS))
        .map(|(index, value)| [*index as f64, value / scale])
        .collect();
    let (_, end) = buffer.window_bounds();
    let start = end.saturating_sub(SPARKLINE_POINTS as u64);
    let y_max = y_max.unwrap_or_else(|| {
        let max = points.iter().map(|p| p[1]).fold(0.0, f64::max);
        (max * 1.2).max(1.0)
    });

    Plot::new(id)
        .height(32.0)
        .show_axes(false)
        .set_margin_fraction(Vec2::ZERO)
        .include_x(start as f64)
        .include_x(end as f64)
        .include_y(0.0)
        .include_y(y_max)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .allow_double_click_reset(false)
        .show_grid(false)
        .show_background(false)
        .show_x(false)
        .show_y(false)
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(PlotPoints::from(points)));
        });
}

/// Bar colour for a usage percentage: warn from 80 %, critical from 90 %.
pub fn usage_color(percent: f64, visuals: &egui::Visuals) -> egui::Color32 {
    if percent >= 90.0 {
        visuals.error_fg_color
    } else if percent >= 80.0 {
        visuals.warn_fg_color
    } else {
        visuals.selection.bg_fill
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_scale_has_headroom_and_floor() {
        let mut buffer = RollingSeriesBuffer::new(8);
        assert_eq!(auto_scale_max(&[PlotSeries::new("empty", &buffer)]), 1.0);

        buffer.append(2_097_152.0);
        let series = [PlotSeries::rate("down", &buffer, DisplayUnit::Binary)];
        assert!((auto_scale_max(&series) - 2.4).abs() < 1e-9);
    }

    #[test]
    fn usage_thresholds() {
        let visuals = egui::Visuals::dark();
        assert_eq!(usage_color(95.0, &visuals), visuals.error_fg_color);
        assert_eq!(usage_color(85.0, &visuals), visuals.warn_fg_color);
        assert_eq!(usage_color(10.0, &visuals), visuals.selection.bg_fill);
    }
}
