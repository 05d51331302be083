mod collector;
mod source;
mod worker;

pub use collector::*;
pub use source::*;
pub use worker::BackgroundWorker;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectError {
    #[error("process enumeration failed: {0}")]
    Source(String),
    #[error("process scan panicked")]
    Panicked,
    #[error("process collector worker is not running")]
    WorkerGone,
}

/// One row of the process table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub threads: usize,
    /// Cores the process may run on; `None` when unknown.
    pub affinity: Option<Vec<usize>>,
}

impl ProcessRecord {
    /// `filter` must already be trimmed and lower-cased. Empty matches all.
    pub fn matches(&self, filter: &str) -> bool {
        filter.is_empty()
            || self.name.to_lowercase().contains(filter)
            || self.pid.to_string().contains(filter)
    }

    fn pinned_cores(&self, n_cores: usize) -> Option<&[usize]> {
        match self.affinity.as_deref() {
            Some(cores) if !cores.is_empty() && cores.len() < n_cores => Some(cores),
            _ => None,
        }
    }
}

/// Result of one full scan, bucketed by core affinity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessSnapshot {
    /// Processes pinned to a strict subset of cores, listed under each of them.
    pub core_processes: Vec<Vec<ProcessRecord>>,
    /// Processes allowed on every core, or whose affinity is unknown.
    pub any_core: Vec<ProcessRecord>,
    /// Totals cover every enumerated process, filtered out or not.
    pub process_count: usize,
    pub thread_count: usize,
}

impl ProcessSnapshot {
    pub fn empty(n_cores: usize) -> Self {
        Self {
            core_processes: vec![Vec::new(); n_cores],
            ..Self::default()
        }
    }

    /// Busiest `n` processes pinned to `core`.
    pub fn top_on_core(&self, core: usize, n: usize) -> &[ProcessRecord] {
        self.core_processes
            .get(core)
            .map(|list| &list[..list.len().min(n)])
            .unwrap_or(&[])
    }

    pub fn top_any_core(&self, n: usize) -> &[ProcessRecord] {
        &self.any_core[..self.any_core.len().min(n)]
    }
}

pub fn normalize_filter(filter: &str) -> String {
    filter.trim().to_lowercase()
}

/// Filters `records` and buckets the survivors by affinity. Each list comes
/// back sorted by CPU usage, busiest first.
pub fn bucket_processes(records: Vec<ProcessRecord>, n_cores: usize, filter: &str) -> ProcessSnapshot {
    let filter = normalize_filter(filter);
    let mut snapshot = ProcessSnapshot::empty(n_cores);
    snapshot.process_count = records.len();
    snapshot.thread_count = records.iter().map(|record| record.threads).sum();

    for record in records {
        if !record.matches(&filter) {
            continue;
        }
        match record.pinned_cores(n_cores) {
            Some(cores) => {
                for &core in cores.iter().filter(|&&core| core < n_cores) {
                    snapshot.core_processes[core].push(record.clone());
                }
            }
            None => snapshot.any_core.push(record),
        }
    }

    let by_cpu = |a: &ProcessRecord, b: &ProcessRecord| b.cpu_percent.total_cmp(&a.cpu_percent);
    for list in &mut snapshot.core_processes {
        list.sort_by(by_cpu);
    }
    snapshot.any_core.sort_by(by_cpu);
    snapshot
}
