use serde::{Deserialize, Serialize};

/// Unit throughput values are displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayUnit {
    /// MB/s, 1 000 000 bytes.
    Decimal,
    /// MiB/s, 1 048 576 bytes.
    #[default]
    Binary,
}

impl DisplayUnit {
    pub const ALL: [DisplayUnit; 2] = [DisplayUnit::Decimal, DisplayUnit::Binary];

    pub fn divisor(self) -> f64 {
        match self {
            DisplayUnit::Decimal => 1_000_000.0,
            DisplayUnit::Binary => 1_048_576.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DisplayUnit::Decimal => "MB/s",
            DisplayUnit::Binary => "MiB/s",
        }
    }

    pub fn convert(self, bytes_per_sec: f64) -> f64 {
        bytes_per_sec / self.divisor()
    }

    pub fn format_rate(self, bytes_per_sec: f64) -> String {
        format!("{:.2} {}", self.convert(bytes_per_sec), self.label())
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1} %", value.clamp(0.0, 100.0))
}

pub fn format_gib(bytes: u64) -> String {
    format!("{:.2} GiB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_megabyte_per_second() {
        assert_eq!(DisplayUnit::Binary.format_rate(1_000_000.0), "0.95 MiB/s");
        assert_eq!(DisplayUnit::Decimal.format_rate(1_000_000.0), "1.00 MB/s");
    }

    #[test]
    fn percent_formatting_clamps() {
        assert_eq!(format_percent(42.26), "42.3 %");
        assert_eq!(format_percent(120.0), "100.0 %");
    }
}
