use std::sync::{Mutex, MutexGuard, PoisonError};

/// Single-slot, last-write-wins handoff between a worker and the UI thread.
///
/// Neither side ever waits for the other: `put` replaces whatever is pending,
/// `take` empties the slot or returns `None`.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, returning the unconsumed value it replaced.
    pub fn put(&self, value: T) -> Option<T> {
        self.lock().replace(value)
    }

    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        // A panic while holding the lock cannot leave an Option half-written.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
