//! Self-adjusting recommit interval.
//!
//! The interval between re-commits of the in-progress block adapts to how
//! long commits actually take: feedback nudges an exponential moving
//! average (ratio 0.1) with a fixed bias, clamped to `[1 s, 15 s]`.

use std::time::Duration;

/// Floor for the recommit interval.
pub const MIN_RECOMMIT_INTERVAL: Duration = Duration::from_secs(1);
/// Ceiling for the recommit interval.
pub const MAX_RECOMMIT_INTERVAL: Duration = Duration::from_secs(15);
/// Impact a single adjustment has on the interval.
const INTERVAL_ADJUST_RATIO: f64 = 0.1;
/// Bias (ns) applied in favour of the adjustment direction.
const INTERVAL_ADJUST_BIAS: f64 = 200_000_000.0;

/// EMA over commit-duration feedback, clamped to the legal window.
#[derive(Clone, Debug)]
pub struct RecommitCalculator {
    /// The operator-configured floor (ns); never adjusted below it.
    minimum: f64,
    current: f64,
}

impl RecommitCalculator {
    /// Start from the configured interval, sanitised into the window.
    pub fn new(configured: Duration) -> Self {
        let clamped = configured
            .max(MIN_RECOMMIT_INTERVAL)
            .min(MAX_RECOMMIT_INTERVAL);
        if clamped != configured {
            tracing::warn!(provided = ?configured, updated = ?clamped, "sanitizing miner recommit interval");
        }
        let ns = clamped.as_nanos() as f64;
        Self {
            minimum: ns,
            current: ns,
        }
    }

    pub fn current(&self) -> Duration {
        Duration::from_nanos(self.current as u64)
    }

    /// Fold one observation into the average. `increase` means the
    /// interval proved too short (a commit was cut off by resubmit).
    pub fn adjust(&mut self, target: Duration, increase: bool) -> Duration {
        let target = target.as_nanos() as f64;
        if increase {
            let next = self.current * (1.0 - INTERVAL_ADJUST_RATIO)
                + INTERVAL_ADJUST_RATIO * (target + INTERVAL_ADJUST_BIAS);
            self.current = next.min(MAX_RECOMMIT_INTERVAL.as_nanos() as f64);
        } else {
            let next = self.current * (1.0 - INTERVAL_ADJUST_RATIO)
                + INTERVAL_ADJUST_RATIO * (target - INTERVAL_ADJUST_BIAS);
            self.current = next.max(self.minimum);
        }
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_interval_is_sanitized() {
        let calc = RecommitCalculator::new(Duration::from_millis(10));
        assert_eq!(calc.current(), MIN_RECOMMIT_INTERVAL);

        let calc = RecommitCalculator::new(Duration::from_secs(60));
        assert_eq!(calc.current(), MAX_RECOMMIT_INTERVAL);
    }

    #[test]
    fn increase_feedback_raises_interval() {
        let mut calc = RecommitCalculator::new(Duration::from_secs(2));
        let before = calc.current();
        let after = calc.adjust(Duration::from_secs(5), true);
        assert!(after > before);
    }

    #[test]
    fn decrease_feedback_never_undershoots_minimum() {
        let mut calc = RecommitCalculator::new(Duration::from_secs(2));
        for _ in 0..100 {
            calc.adjust(Duration::from_millis(1), false);
        }
        assert_eq!(calc.current(), Duration::from_secs(2));
    }

    #[test]
    fn converges_into_the_window_from_any_feedback() {
        let mut calc = RecommitCalculator::new(Duration::from_secs(1));
        for i in 0..1000u64 {
            let target = Duration::from_millis((i % 40) * 1000);
            calc.adjust(target, i % 2 == 0);
            assert!(calc.current() >= MIN_RECOMMIT_INTERVAL);
            assert!(calc.current() <= MAX_RECOMMIT_INTERVAL);
        }
    }
}
