use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::metrics::{DisplayUnit, SamplerConfig};

/// Environment variable naming an optional JSON settings file.
pub const CONFIG_ENV: &str = "SYSVIS_CONFIG";

pub const SAMPLE_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 1..=5000;
pub const REFRESH_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 100..=5000;
pub const HISTORY_LEN_RANGE: std::ops::RangeInclusive<usize> = 2..=5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Settings {
    pub scale: f32,
    pub font_size: f32,
    pub sample_interval_ms: u64,
    pub gpu_refresh_ms: u64,
    pub process_refresh_ms: u64,
    /// How often the nvidia-smi poller runs the tool.
    pub gpu_poll_ms: u64,
    pub display_unit: DisplayUnit,
    pub history_len: usize,
    pub core_history_len: usize,
    #[serde(skip)]
    show_window: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scale: 1.2,
            font_size: 15.0,
            sample_interval_ms: 100,
            gpu_refresh_ms: 100,
            process_refresh_ms: 1000,
            gpu_poll_ms: 1000,
            display_unit: DisplayUnit::Binary,
            history_len: 400,
            core_history_len: 200,
            show_window: false,
        }
    }
}

impl Settings {
    /// Defaults, overridden by the file named in `SYSVIS_CONFIG` if set.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load_from(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("sample_interval_ms", self.sample_interval_ms),
            ("gpu_refresh_ms", self.gpu_refresh_ms),
            ("process_refresh_ms", self.process_refresh_ms),
            ("gpu_poll_ms", self.gpu_poll_ms),
        ];
        if let Some((field, _)) = intervals.into_iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::Invalid {
                field,
                reason: "must be at least 1 ms",
            });
        }
        if self.history_len < 2 {
            return Err(ConfigError::Invalid {
                field: "history_len",
                reason: "must hold at least 2 points",
            });
        }
        if self.core_history_len < 2 {
            return Err(ConfigError::Invalid {
                field: "core_history_len",
                reason: "must hold at least 2 points",
            });
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ConfigError::Invalid {
                field: "scale",
                reason: "must be positive",
            });
        }
        if !(self.font_size.is_finite() && self.font_size >= 4.0) {
            return Err(ConfigError::Invalid {
                field: "font_size",
                reason: "must be at least 4",
            });
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn gpu_refresh(&self) -> Duration {
        Duration::from_millis(self.gpu_refresh_ms)
    }

    pub fn process_refresh(&self) -> Duration {
        Duration::from_millis(self.process_refresh_ms)
    }

    pub fn gpu_poll(&self) -> Duration {
        Duration::from_millis(self.gpu_poll_ms)
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            history_len: self.history_len,
            core_history_len: self.core_history_len,
            gpu_refresh: self.gpu_refresh(),
            display_unit: self.display_unit,
        }
    }

    pub fn show(&mut self) {
        self.show_window = true;
    }

    pub fn is_visible(&self) -> bool {
        self.show_window
    }

    pub fn hide(&mut self) {
        self.show_window = false;
    }

    pub fn apply(&self, ctx: &egui::Context) {
        ctx.set_pixels_per_point(self.scale);

        let mut style = (*ctx.style()).clone();
        style.text_styles = [
            (
                egui::TextStyle::Heading,
                egui::FontId::new(self.font_size + 4.0, egui::FontFamily::Proportional),
            ),
            (
                egui::TextStyle::Body,
                egui::FontId::new(self.font_size, egui::FontFamily::Proportional),
            ),
            (
                egui::TextStyle::Monospace,
                egui::FontId::new(self.font_size, egui::FontFamily::Monospace),
            ),
            (
                egui::TextStyle::Button,
                egui::FontId::new(self.font_size, egui::FontFamily::Proportional),
            ),
            (
                egui::TextStyle::Small,
                egui::FontId::new(self.font_size - 2.0, egui::FontFamily::Proportional),
            ),
        ]
        .into();
        ctx.set_style(style);
    }
}
