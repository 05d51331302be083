use std::collections::HashMap;
use std::time::Duration;

/// Shortest interval a rate is ever divided by.
pub const MIN_ELAPSED: Duration = Duration::from_millis(1);

/// One raw read of a cumulative OS counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Cumulative count since boot (or since the source started counting).
    pub value: u64,
    /// Monotonic reading, measured from an arbitrary origin shared by all
    /// snapshots of the same channel.
    pub timestamp: Duration,
}

impl CounterSnapshot {
    pub fn new(value: u64, timestamp: Duration) -> Self {
        Self { value, timestamp }
    }
}

/// Counters the sampler turns into rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    NetSent,
    NetRecv,
    DiskRead,
    DiskWrite,
}

/// Converts successive counter snapshots into units per second.
///
/// The first snapshot of every channel only establishes a baseline and yields
/// `0.0`. A counter that goes backwards (wrap, device reset, interface removed)
/// also yields `0.0` and becomes the new baseline.
#[derive(Debug, Default, Clone)]
pub struct RateEstimator {
    previous: HashMap<Channel, CounterSnapshot>,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimate(&mut self, channel: Channel, snapshot: CounterSnapshot) -> f64 {
        let Some(previous) = self.previous.insert(channel, snapshot) else {
            return 0.0;
        };

        if snapshot.value < previous.value {
            log::debug!(
                "{channel:?} counter went backwards ({} -> {}), rebaselining",
                previous.value,
                snapshot.value
            );
            return 0.0;
        }

        let delta = (snapshot.value - previous.value) as f64;
        let elapsed = snapshot
            .timestamp
            .checked_sub(previous.timestamp)
            .unwrap_or_default()
            .max(MIN_ELAPSED);

        delta / elapsed.as_secs_f64()
    }

    pub fn has_baseline(&self, channel: Channel) -> bool {
        self.previous.contains_key(&channel)
    }

    /// Forgets the baseline of one channel; its next estimate is a warm-up again.
    pub fn reset(&mut self, channel: Channel) {
        self.previous.remove(&channel);
    }

    pub fn clear(&mut self) {
        self.previous.clear();
    }
}
