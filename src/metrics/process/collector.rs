use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use super::{bucket_processes, BackgroundWorker, CollectError, ProcessSnapshot, ProcessSource};
use crate::metrics::mailbox::Mailbox;

pub type CollectResult = Result<ProcessSnapshot, CollectError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Collecting,
    ShutDown,
}

/// Runs process scans off the UI thread, one at a time.
///
/// Results land in a single-slot mailbox; a scan that finishes before the
/// previous result was read replaces it.
pub struct AsyncProcessCollector<S: ProcessSource> {
    source: Arc<Mutex<S>>,
    state: Arc<Mutex<CollectorState>>,
    mailbox: Arc<Mailbox<CollectResult>>,
    worker: Option<BackgroundWorker>,
}

impl<S: ProcessSource> AsyncProcessCollector<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            state: Arc::new(Mutex::new(CollectorState::Idle)),
            mailbox: Arc::new(Mailbox::new()),
            worker: Some(BackgroundWorker::new("process-collector")),
        }
    }

    pub fn state(&self) -> CollectorState {
        *lock(&self.state)
    }

    pub fn is_collecting(&self) -> bool {
        self.state() == CollectorState::Collecting
    }

    pub fn is_shut_down(&self) -> bool {
        self.state() == CollectorState::ShutDown
    }

    pub fn core_count(&self) -> usize {
        lock(&self.source).core_count()
    }

    /// Dispatches a scan unless one is running or the collector is shut down.
    /// Returns whether a scan was dispatched.
    pub fn start_collection(&self, n_cores: usize, filter: &str) -> bool {
        let Some(worker) = &self.worker else {
            return false;
        };

        {
            let mut state = lock(&self.state);
            if *state != CollectorState::Idle {
                return false;
            }
            *state = CollectorState::Collecting;
        }

        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let mailbox = Arc::clone(&self.mailbox);
        let filter = filter.to_string();

        let dispatched = worker.spawn(move || {
            let scanned = catch_unwind(AssertUnwindSafe(|| lock(&source).processes()));
            let result = match scanned {
                Ok(Ok(records)) => Ok(bucket_processes(records, n_cores, &filter)),
                Ok(Err(e)) => {
                    debug!("process scan failed: {e}");
                    Err(e)
                }
                Err(_) => {
                    warn!("process scan panicked");
                    Err(CollectError::Panicked)
                }
            };
            finish(&state, &mailbox, result);
        });

        if !dispatched {
            warn!("process collector worker is gone");
            finish(&self.state, &self.mailbox, Err(CollectError::WorkerGone));
            return false;
        }
        true
    }

    /// Takes the pending result, if any, without waiting.
    pub fn get_result(&self) -> Option<CollectResult> {
        self.mailbox.take()
    }

    /// Disables the collector for good and joins the worker, waiting for a
    /// scan in flight. Safe to call more than once.
    pub fn shutdown(&mut self) {
        *lock(&self.state) = CollectorState::ShutDown;
        if let Some(mut worker) = self.worker.take() {
            worker.join();
            info!("process collector shut down");
        }
    }
}

impl<S: ProcessSource> Drop for AsyncProcessCollector<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Publishes and leaves `Collecting` under one lock, so a caller that has seen
/// the result also sees the collector idle.
fn finish(state: &Mutex<CollectorState>, mailbox: &Mailbox<CollectResult>, result: CollectResult) {
    let mut state = lock(state);
    mailbox.put(result);
    if *state == CollectorState::Collecting {
        *state = CollectorState::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::process::ProcessRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    struct FixedSource {
        records: Vec<ProcessRecord>,
        calls: Arc<AtomicUsize>,
    }

    impl ProcessSource for FixedSource {
        fn processes(&mut self) -> Result<Vec<ProcessRecord>, CollectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }
        fn core_count(&self) -> usize {
            2
        }
    }

    struct PanickingSource;

    impl ProcessSource for PanickingSource {
        fn processes(&mut self) -> Result<Vec<ProcessRecord>, CollectError> {
            panic!("boom");
        }
        fn core_count(&self) -> usize {
            1
        }
    }

    fn wait_for_result<S: ProcessSource>(collector: &AsyncProcessCollector<S>) -> CollectResult {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = collector.get_result() {
                return result;
            }
            assert!(Instant::now() < deadline, "no result published");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn sample_records() -> Vec<ProcessRecord> {
        vec![ProcessRecord {
            pid: 1,
            name: "init".into(),
            cpu_percent: 0.1,
            memory_percent: 0.2,
            threads: 1,
            affinity: None,
        }]
    }

    #[test]
    fn scan_returns_to_idle_with_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let collector = AsyncProcessCollector::new(FixedSource {
            records: sample_records(),
            calls: Arc::clone(&calls),
        });

        assert!(collector.start_collection(2, ""));
        let snapshot = wait_for_result(&collector).unwrap();
        assert_eq!(snapshot.process_count, 1);
        assert_eq!(snapshot.core_processes.len(), 2);
        assert_eq!(collector.state(), CollectorState::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(collector.get_result().is_none());
    }

    #[test]
    fn panic_in_source_is_reported() {
        let collector = AsyncProcessCollector::new(PanickingSource);
        assert!(collector.start_collection(1, ""));
        assert_eq!(wait_for_result(&collector), Err(CollectError::Panicked));
        assert!(!collector.is_collecting());
        assert!(collector.start_collection(1, ""));
    }

    #[test]
    fn shutdown_is_final_and_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut collector = AsyncProcessCollector::new(FixedSource {
            records: sample_records(),
            calls: Arc::clone(&calls),
        });
        collector.shutdown();
        collector.shutdown();
        assert!(collector.is_shut_down());
        assert!(!collector.start_collection(2, ""));
        assert!(collector.get_result().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
