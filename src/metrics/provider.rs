use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Networks, RefreshKind, System};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} is not available on this platform")]
    Unavailable(&'static str),
    #[error("failed to read {source_name}: {source}")]
    Io {
        source_name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {source_name}: {detail}")]
    Parse {
        source_name: &'static str,
        detail: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Cheap per-tick reads of system-wide counters.
///
/// Every call may fail independently; the sampler substitutes a default for the
/// failing channel only.
pub trait OsMetricsProvider {
    /// Global CPU usage in percent. Also refreshes the per-core readings.
    fn cpu_percent(&mut self) -> Result<f32, ProviderError>;

    /// Per-core usage as of the latest `cpu_percent` call.
    fn cpu_percent_percpu(&mut self) -> Result<Vec<f32>, ProviderError>;

    fn cpu_frequencies_mhz(&mut self) -> Result<Vec<u64>, ProviderError> {
        Ok(Vec::new())
    }

    fn virtual_memory_percent(&mut self) -> Result<f32, ProviderError>;

    fn net_io_counters(&mut self) -> Result<NetCounters, ProviderError>;

    fn disk_io_counters(&mut self) -> Result<DiskCounters, ProviderError>;
}

/// `OsMetricsProvider` backed by `sysinfo`.
pub struct SysinfoProvider {
    system: System,
    networks: Networks,
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProvider {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        Self {
            system,
            networks: Networks::new_with_refreshed_list(),
        }
    }

    pub fn core_count(&self) -> usize {
        self.system.cpus().len().max(1)
    }
}

impl OsMetricsProvider for SysinfoProvider {
    fn cpu_percent(&mut self) -> Result<f32, ProviderError> {
        self.system.refresh_cpu_usage();
        Ok(self.system.global_cpu_usage())
    }

    fn cpu_percent_percpu(&mut self) -> Result<Vec<f32>, ProviderError> {
        let cores: Vec<f32> = self.system.cpus().iter().map(|cpu| cpu.cpu_usage()).collect();
        if cores.is_empty() {
            return Err(ProviderError::Unavailable("per-core cpu usage"));
        }
        Ok(cores)
    }

    fn cpu_frequencies_mhz(&mut self) -> Result<Vec<u64>, ProviderError> {
        self.system.refresh_cpu_frequency();
        Ok(self.system.cpus().iter().map(|cpu| cpu.frequency()).collect())
    }

    fn virtual_memory_percent(&mut self) -> Result<f32, ProviderError> {
        self.system.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        let total = self.system.total_memory();
        if total == 0 {
            return Err(ProviderError::Unavailable("memory totals"));
        }
        let used = total.saturating_sub(self.system.available_memory());
        Ok((used as f64 / total as f64 * 100.0) as f32)
    }

    fn net_io_counters(&mut self) -> Result<NetCounters, ProviderError> {
        self.networks.refresh(true);
        let counters = self
            .networks
            .iter()
            .fold(NetCounters::default(), |acc, (_, data)| NetCounters {
                bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
                bytes_recv: acc.bytes_recv.saturating_add(data.total_received()),
            });
        Ok(counters)
    }

    fn disk_io_counters(&mut self) -> Result<DiskCounters, ProviderError> {
        #[cfg(target_os = "linux")]
        {
            linux::disk_io_counters()
        }
        #[cfg(not(target_os = "linux"))]
        {
            // Sum of per-process totals; drops when a process exits, which the
            // rate estimator treats as a reset.
            use sysinfo::{ProcessRefreshKind, ProcessesToUpdate};

            self.system.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                ProcessRefreshKind::nothing().with_disk_usage(),
            );
            let counters = self.system.processes().values().fold(
                DiskCounters::default(),
                |acc, process| {
                    let usage = process.disk_usage();
                    DiskCounters {
                        read_bytes: acc.read_bytes.saturating_add(usage.total_read_bytes),
                        write_bytes: acc.write_bytes.saturating_add(usage.total_written_bytes),
                    }
                },
            );
            Ok(counters)
        }
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use super::{DiskCounters, ProviderError};
    use std::path::Path;

    const DISKSTATS: &str = "/proc/diskstats";
    const SECTOR_SIZE: u64 = 512;

    pub(super) fn disk_io_counters() -> Result<DiskCounters, ProviderError> {
        let contents = std::fs::read_to_string(DISKSTATS).map_err(|source| ProviderError::Io {
            source_name: DISKSTATS,
            source,
        })?;
        parse_diskstats(&contents, |name| {
            Path::new("/sys/block").join(name).exists()
        })
    }

    /// Sums sectors read/written over whole block devices, skipping partitions
    /// and virtual devices so nothing is counted twice.
    pub(crate) fn parse_diskstats(
        contents: &str,
        is_block_device: impl Fn(&str) -> bool,
    ) -> Result<DiskCounters, ProviderError> {
        let mut counters = DiskCounters::default();
        let mut devices = 0usize;

        for line in contents.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 {
                continue;
            }
            let name = fields[2];
            if name.starts_with("loop") || name.starts_with("ram") || !is_block_device(name) {
                continue;
            }
            let parse = |field: &str| {
                field.parse::<u64>().map_err(|e| ProviderError::Parse {
                    source_name: DISKSTATS,
                    detail: format!("{name}: {e}"),
                })
            };
            let sectors_read = parse(fields[5])?;
            let sectors_written = parse(fields[9])?;
            counters.read_bytes = counters
                .read_bytes
                .saturating_add(sectors_read.saturating_mul(SECTOR_SIZE));
            counters.write_bytes = counters
                .write_bytes
                .saturating_add(sectors_written.saturating_mul(SECTOR_SIZE));
            devices += 1;
        }

        if devices == 0 {
            return Err(ProviderError::Unavailable("block device counters"));
        }
        Ok(counters)
    }

}
