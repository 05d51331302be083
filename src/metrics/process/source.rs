use super::{CollectError, ProcessRecord};
use log::debug;
use sysinfo::{
    CpuRefreshKind, MemoryRefreshKind, Process, ProcessRefreshKind, ProcessesToUpdate, RefreshKind,
    System,
};

/// Enumerates the live process table. Runs on the collector's worker thread.
pub trait ProcessSource: Send + 'static {
    fn processes(&mut self) -> Result<Vec<ProcessRecord>, CollectError>;

    fn core_count(&self) -> usize;
}

/// `ProcessSource` backed by `sysinfo`, with affinity and thread counts read
/// from `/proc` on Linux.
pub struct SysinfoProcessSource {
    system: System,
    core_count: usize,
    primed: bool,
}

impl Default for SysinfoProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProcessSource {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        let core_count = system.cpus().len().max(1);
        Self {
            system,
            core_count,
            primed: false,
        }
    }

    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing().with_cpu().with_memory()
    }

    fn record(&self, process: &Process, total_memory: u64) -> ProcessRecord {
        let pid = process.pid().as_u32();
        let memory_percent = if total_memory == 0 {
            0.0
        } else {
            (process.memory() as f64 / total_memory as f64 * 100.0) as f32
        };
        let (affinity, threads) = affinity_and_threads(process);

        ProcessRecord {
            pid,
            name: process.name().to_string_lossy().into_owned(),
            cpu_percent: process.cpu_usage(),
            memory_percent,
            threads,
            affinity,
        }
    }
}

impl ProcessSource for SysinfoProcessSource {
    fn processes(&mut self) -> Result<Vec<ProcessRecord>, CollectError> {
        // CPU usage is a delta between two refreshes; the first scan needs a
        // baseline or every process reads 0 %.
        if !self.primed {
            self.system
                .refresh_processes_specifics(ProcessesToUpdate::All, true, Self::refresh_kind());
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            self.primed = true;
        }

        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, true, Self::refresh_kind());
        self.system
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        let total_memory = self.system.total_memory();

        let records: Vec<ProcessRecord> = self
            .system
            .processes()
            .values()
            .filter(|process| process.thread_kind().is_none())
            .map(|process| self.record(process, total_memory))
            .collect();

        if records.is_empty() {
            return Err(CollectError::Source("no processes enumerated".to_string()));
        }
        debug!("enumerated {} processes", records.len());
        Ok(records)
    }

    fn core_count(&self) -> usize {
        self.core_count
    }
}

#[cfg(target_os = "linux")]
fn affinity_and_threads(process: &Process) -> (Option<Vec<usize>>, usize) {
    let path = format!("/proc/{}/status", process.pid().as_u32());
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let status = parse_status(&contents);
            (status.cpus_allowed, status.threads.unwrap_or(1))
        }
        // Process exited mid-scan or is not ours to read.
        Err(_) => (None, 1),
    }
}

#[cfg(not(target_os = "linux"))]
fn affinity_and_threads(process: &Process) -> (Option<Vec<usize>>, usize) {
    let threads = process.tasks().map(|tasks| tasks.len().max(1)).unwrap_or(1);
    (None, threads)
}

#[derive(Debug, Default, PartialEq)]
pub struct ProcStatus {
    pub cpus_allowed: Option<Vec<usize>>,
    pub threads: Option<usize>,
}

/// Picks `Cpus_allowed_list` and `Threads` out of `/proc/<pid>/status`.
pub fn parse_status(contents: &str) -> ProcStatus {
    let mut status = ProcStatus::default();
    for line in contents.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "Cpus_allowed_list" => status.cpus_allowed = parse_cpu_list(value.trim()),
            "Threads" => status.threads = value.trim().parse().ok(),
            _ => {}
        }
    }
    status
}

/// Parses kernel cpu lists such as `0-3,8,10-11`.
pub fn parse_cpu_list(list: &str) -> Option<Vec<usize>> {
    let mut cpus = Vec::new();
    for part in list.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: usize = start.trim().parse().ok()?;
                let end: usize = end.trim().parse().ok()?;
                if end < start {
                    return None;
                }
                cpus.extend(start..=end);
            }
            None => cpus.push(part.parse().ok()?),
        }
    }
    cpus.sort_unstable();
    cpus.dedup();
    (!cpus.is_empty()).then_some(cpus)
}
