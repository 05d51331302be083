/// Smallest value the reference is allowed to decay to.
pub const REFERENCE_FLOOR: f64 = 1e-6;

pub const DEFAULT_TIME_CONSTANT_SECS: f64 = 10.0;

/// Peak-holding envelope that forgets slowly.
///
/// Used as the 100 % mark for bars and axes that have no natural maximum
/// (throughput). A spike raises the reference immediately; afterwards it decays
/// with `exp(-dt / time_constant)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayingReferenceMax {
    current_max: f64,
    time_constant: f64,
}

impl Default for DecayingReferenceMax {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_CONSTANT_SECS)
    }
}

impl DecayingReferenceMax {
    pub fn new(time_constant_secs: f64) -> Self {
        Self {
            current_max: 1.0,
            time_constant: time_constant_secs.max(f64::EPSILON),
        }
    }

    pub fn current(&self) -> f64 {
        self.current_max
    }

    pub fn time_constant(&self) -> f64 {
        self.time_constant
    }

    pub fn update(&mut self, observed: f64, dt_seconds: f64) -> f64 {
        let dt = if dt_seconds.is_finite() { dt_seconds.max(0.0) } else { 0.0 };
        let decayed = self.current_max * (-dt / self.time_constant).exp();
        let observed = if observed.is_finite() { observed } else { 0.0 };

        self.current_max = observed.max(decayed).max(REFERENCE_FLOOR);
        self.current_max
    }

    /// `value` relative to the current reference, clamped to `0..=100`.
    pub fn as_percentage(&self, value: f64) -> f64 {
        (value / self.current_max * 100.0).clamp(0.0, 100.0)
    }

    pub fn reset(&mut self, baseline: f64) {
        self.current_max = baseline.max(REFERENCE_FLOOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_is_held_then_decays() {
        let mut reference = DecayingReferenceMax::default();
        assert_eq!(reference.update(50.0, 0.1), 50.0);

        let after = reference.update(0.0, 10.0);
        assert!((after - 50.0 * (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn zero_dt_applies_no_decay() {
        let mut reference = DecayingReferenceMax::default();
        reference.update(8.0, 0.0);
        assert_eq!(reference.update(0.0, 0.0), 8.0);
        assert_eq!(reference.update(0.0, -3.0), 8.0);
    }

    #[test]
    fn idle_channel_decays_strictly_down_to_floor() {
        let mut reference = DecayingReferenceMax::new(0.5);
        let mut previous = reference.update(100.0, 0.0);
        let mut reached_floor = false;
        for _ in 0..500 {
            let current = reference.update(0.0, 0.25);
            assert!(current <= previous);
            if previous > REFERENCE_FLOOR {
                assert!(current < previous || current == REFERENCE_FLOOR);
            }
            assert!(current >= REFERENCE_FLOOR);
            reached_floor |= current == REFERENCE_FLOOR;
            previous = current;
        }
        assert!(reached_floor);
    }

    #[test]
    fn envelope_never_below_observation() {
        let mut reference = DecayingReferenceMax::default();
        let observations = [0.0, 3.5, 1.0, 0.2, 900.0, 899.0, 12.0, 0.0, 15.0];
        for (i, value) in observations.iter().enumerate() {
            let max = reference.update(*value, 0.05 * i as f64);
            assert!(max >= *value);
        }
    }

    #[test]
    fn percentage_is_clamped() {
        let mut reference = DecayingReferenceMax::default();
        reference.update(4.0, 0.0);
        assert_eq!(reference.as_percentage(1.0), 25.0);
        assert_eq!(reference.as_percentage(-1.0), 0.0);
        assert_eq!(reference.as_percentage(40.0), 100.0);
    }

    #[test]
    fn reset_restores_baseline() {
        let mut reference = DecayingReferenceMax::default();
        reference.update(1_000.0, 0.0);
        reference.reset(1.0);
        assert_eq!(reference.current(), 1.0);
        reference.reset(0.0);
        assert_eq!(reference.current(), REFERENCE_FLOOR);
    }
}
