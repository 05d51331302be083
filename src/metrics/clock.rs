use std::time::{Duration, Instant};

use super::rate::MIN_ELAPSED;

/// Drives the sampling tick from the UI loop.
///
/// `poll_at` is called every frame. Once `interval` has passed since the previous
/// tick it restarts the elapsed clock and returns the measured time, floored to
/// one millisecond. The clock restarts on every due tick, paused or not, so the
/// caller can simply discard the value while paused and nothing accumulates.
#[derive(Debug, Clone)]
pub struct TickTimer {
    interval: Duration,
    last_tick: Instant,
}

impl TickTimer {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval: interval.max(MIN_ELAPSED),
            last_tick: start,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval.max(MIN_ELAPSED);
    }

    pub fn poll_at(&mut self, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.last_tick);
        if elapsed < self.interval {
            return None;
        }
        self.last_tick = now;
        Some(elapsed.max(MIN_ELAPSED))
    }

    /// Time left until the next tick is due, for scheduling a repaint.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.interval
            .saturating_sub(now.saturating_duration_since(self.last_tick))
    }
}

/// Fires once the time fed to it reaches `interval`.
#[derive(Debug, Clone)]
pub struct IntervalGate {
    interval: Duration,
    accumulated: Duration,
    forced: bool,
}

impl IntervalGate {
    /// A new gate fires on its first `advance`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            accumulated: Duration::ZERO,
            forced: true,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn advance(&mut self, dt: Duration) -> bool {
        self.accumulated += dt;
        if self.forced || self.accumulated >= self.interval {
            self.forced = false;
            self.accumulated = Duration::ZERO;
            return true;
        }
        false
    }

    /// Makes the next `advance` fire regardless of the accumulated time.
    pub fn force(&mut self) {
        self.forced = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_only_when_due() {
        let start = Instant::now();
        let mut timer = TickTimer::starting_at(Duration::from_millis(100), start);

        assert_eq!(timer.poll_at(start + Duration::from_millis(40)), None);
        assert_eq!(
            timer.poll_at(start + Duration::from_millis(130)),
            Some(Duration::from_millis(130))
        );
        assert_eq!(timer.poll_at(start + Duration::from_millis(200)), None);
        assert_eq!(
            timer.remaining_at(start + Duration::from_millis(200)),
            Duration::from_millis(30)
        );
    }

    #[test]
    fn paused_ticks_do_not_accumulate() {
        let start = Instant::now();
        let mut timer = TickTimer::starting_at(Duration::from_millis(100), start);
        let mut paused = true;
        let mut sampled = Vec::new();

        for step in 1..=10u64 {
            if step == 6 {
                paused = false;
            }
            if let Some(dt) = timer.poll_at(start + Duration::from_millis(step * 100)) {
                if !paused {
                    sampled.push(dt);
                }
            }
        }

        assert_eq!(sampled.len(), 5);
        assert!(sampled.iter().all(|dt| *dt == Duration::from_millis(100)));
    }

    #[test]
    fn elapsed_is_floored() {
        let start = Instant::now();
        let mut timer = TickTimer::starting_at(Duration::ZERO, start);
        assert_eq!(timer.interval(), MIN_ELAPSED);
        assert_eq!(
            timer.poll_at(start + Duration::from_micros(1_200)),
            Some(Duration::from_micros(1_200))
        );
    }

    #[test]
    fn gate_fires_first_then_on_interval() {
        let mut gate = IntervalGate::new(Duration::from_millis(250));
        assert!(gate.advance(Duration::from_millis(100)));
        assert!(!gate.advance(Duration::from_millis(100)));
        assert!(!gate.advance(Duration::from_millis(100)));
        assert!(gate.advance(Duration::from_millis(100)));

        gate.force();
        assert!(gate.advance(Duration::ZERO));
        assert!(!gate.advance(Duration::ZERO));
    }
}
