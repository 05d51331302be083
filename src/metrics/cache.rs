use std::any::Any;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

type Entries = HashMap<&'static str, Box<dyn Any + Send + Sync>>;

/// Memo for lookups that are expensive and never change while we run, such as
/// the CPU model string. Passed to whoever needs it; `reset` clears it.
#[derive(Default)]
pub struct SystemInfoCache {
    entries: Mutex<Entries>,
}

impl std::fmt::Debug for SystemInfoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&'static str> = self.lock().keys().copied().collect();
        keys.sort_unstable();
        f.debug_struct("SystemInfoCache").field("keys", &keys).finish()
    }
}

impl SystemInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// `compute` runs without the lock held, so two racing callers may both
    /// compute; the first stored value wins.
    pub fn get_or_compute<T, F>(&self, key: &'static str, compute: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.get::<T>(key) {
            return value;
        }
        let value = compute();
        let mut entries = self.lock();
        match entries.get(key).and_then(|v| v.downcast_ref::<T>()) {
            Some(existing) => existing.clone(),
            None => {
                entries.insert(key, Box::new(value.clone()));
                value
            }
        }
    }

    /// `None` on a miss or when the stored value has a different type.
    pub fn get<T: Clone + 'static>(&self, key: &'static str) -> Option<T> {
        self.lock()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn set<T: Send + Sync + 'static>(&self, key: &'static str, value: T) {
        self.lock().insert(key, Box::new(value));
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn computes_once() {
        let cache = SystemInfoCache::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            "AMD Ryzen 7 5800X".to_string()
        };

        assert_eq!(cache.get_or_compute("cpu_model", compute), "AMD Ryzen 7 5800X");
        let cached: String = cache.get_or_compute("cpu_model", || unreachable!());
        assert_eq!(cached, "AMD Ryzen 7 5800X");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn reset_forgets_everything() {
        let cache = SystemInfoCache::new();
        cache.set("cores", 8usize);
        assert_eq!(cache.get::<usize>("cores"), Some(8));
        cache.reset();
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_compute("cores", || 4usize), 4);
    }

    #[test]
    fn wrong_type_is_a_miss() {
        let cache = SystemInfoCache::new();
        cache.set("cores", 8u32);
        assert_eq!(cache.get::<String>("cores"), None);
    }
}
