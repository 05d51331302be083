use crossbeam_channel::{unbounded, Sender};
use log::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// One named thread draining a job queue in order.
pub struct BackgroundWorker {
    tx: Option<Sender<Job>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl BackgroundWorker {
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = unbounded::<Job>();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    job();
                }
                debug!("{name} worker exiting");
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("failed to spawn {name} worker: {e}");
                None
            }
        };

        Self {
            tx: Some(tx),
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.tx.is_some()
    }

    /// Queues `job`. Returns `false` if the worker is gone and the job was dropped.
    pub fn spawn<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.handle.is_none() {
            return false;
        }
        match &self.tx {
            Some(tx) => tx.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Closes the queue and waits for queued jobs to finish.
    pub fn join(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("background worker panicked");
            }
        }
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.join();
    }
}
