use super::bounds::DelayBounds;
use crate::{
    Time,
    defaults::{INITIAL_INTERVAL, MAX_INTERVAL, MIN_INTERVAL},
};
use std::fmt;

/// Which rule of the decision table produced the last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// fewer than the minimum number of samples: speed up unconditionally
    Bootstrap,
    /// more than 10 packets lost since the previous feedback
    HeavyLoss,
    /// between 1 and 10 packets lost since the previous feedback
    Loss,
    /// delay close to its lowest observed value
    LowDelay,
    /// delay close to its highest observed value
    HighDelay,
    /// delay above the target band, steered by the trendline
    AboveTarget,
    /// delay below the target band, steered by the trendline
    BelowTarget,
    /// delay inside the target band, drift toward the target interval
    Hold,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bootstrap => "bootstrap",
            Self::HeavyLoss => "heavy-loss",
            Self::Loss => "loss",
            Self::LowDelay => "low-delay",
            Self::HighDelay => "high-delay",
            Self::AboveTarget => "above-target",
            Self::BelowTarget => "below-target",
            Self::Hold => "hold",
        };
        f.write_str(name)
    }
}

/// The next-send delay, always inside `[MIN_INTERVAL, MAX_INTERVAL]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingInterval(Time);

impl PacingInterval {
    #[inline]
    pub fn get(&self) -> Time {
        self.0
    }

    /// Accept `candidate` if it is inside the allowed range, otherwise
    /// keep the current value. Returns whether the value was accepted.
    pub fn propose(&mut self, candidate: Time) -> bool {
        if (MIN_INTERVAL..=MAX_INTERVAL).contains(&candidate) {
            self.0 = candidate;
            true
        } else {
            tracing::trace!(%candidate, current = %self.0, "interval proposal out of range");
            false
        }
    }
}

impl Default for PacingInterval {
    fn default() -> Self {
        Self(INITIAL_INTERVAL)
    }
}

/// Inputs of the steady state decision table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Signals {
    pub(crate) loss_delta: u32,
    pub(crate) smoothed_delay: Time,
    pub(crate) delay: DelayBounds,
    pub(crate) slope: f64,
    pub(crate) target_interval: Time,
}

pub(crate) fn bootstrap(interval: &mut PacingInterval) -> Decision {
    interval.propose(interval.get() * 75 / 100);
    Decision::Bootstrap
}

/// Apply the first matching rule of the decision table.
pub(crate) fn steady(interval: &mut PacingInterval, signals: &Signals) -> Decision {
    let Signals {
        loss_delta,
        smoothed_delay: delay,
        delay: bounds,
        slope,
        target_interval,
    } = *signals;

    if loss_delta > 10 {
        interval.propose(interval.get() * 100 / 70);
        return Decision::HeavyLoss;
    }
    if loss_delta > 0 {
        interval.propose(interval.get() * 100 / (100 - 3 * i64::from(loss_delta)));
        return Decision::Loss;
    }
    if delay <= bounds.min() * 100 / 95 {
        interval.propose(interval.get() * 95 / 100);
        return Decision::LowDelay;
    }
    if delay > bounds.max() * 95 / 100 {
        interval.propose(interval.get() * 100 / 85);
        return Decision::HighDelay;
    }

    let average = bounds.average();
    if delay > average * 100 / 80 {
        // delay increasing: slow down
        if slope > 0.05 {
            interval.propose(interval.get() * 100 / 95);
        } else if slope >= -0.01 {
            interval.propose(interval.get() * 100 / 97);
        }
        // delay decreasing: speed up
        if slope < -0.10 {
            interval.propose(interval.get() * 96 / 100);
        } else if slope < -0.05 {
            interval.propose(interval.get() * 98 / 100);
        }
        Decision::AboveTarget
    } else if delay < average * 80 / 100 {
        if slope > 0.10 {
            interval.propose(interval.get() * 100 / 95);
        } else if slope > 0.05 {
            interval.propose(interval.get() * 100 / 97);
        }
        if slope < -0.05 {
            interval.propose(interval.get() * 96 / 100);
        } else if slope <= 0.01 {
            interval.propose(interval.get() * 98 / 100);
        }
        Decision::BelowTarget
    } else {
        interval.propose(Time::smooth(
            interval.get(),
            target_interval * 100 / 97,
            5,
            5,
        ));
        Decision::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(micros: i64) -> PacingInterval {
        PacingInterval(Time::from_micros(micros))
    }

    fn bounds(min_ms: i64, max_ms: i64) -> DelayBounds {
        let mut bounds = DelayBounds::default();
        bounds.widen(Time::from_millis(min_ms));
        bounds.widen(Time::from_millis(max_ms));
        bounds
    }

    fn signals(loss_delta: u32, delay_ms: i64, slope: f64) -> Signals {
        Signals {
            loss_delta,
            smoothed_delay: Time::from_millis(delay_ms),
            delay: bounds(1, 100),
            slope,
            target_interval: Time::from_micros(970),
        }
    }

    #[test]
    fn clamp() {
        let mut value = interval(500);
        assert!(!value.propose(Time::from_micros(199)));
        assert!(!value.propose(Time::from_nanos(10_000_001)));
        assert_eq!(value.get(), Time::from_micros(500));

        assert!(value.propose(Time::from_micros(200)));
        assert!(value.propose(Time::from_millis(10)));
        assert_eq!(value.get(), Time::from_millis(10));
    }

    #[test]
    fn bootstrap_speeds_up() {
        let mut value = interval(500);
        assert_eq!(bootstrap(&mut value), Decision::Bootstrap);
        assert_eq!(value.get(), Time::from_micros(375));

        let mut value = interval(210);
        bootstrap(&mut value);
        assert_eq!(value.get(), Time::from_micros(210));
    }

    #[test]
    fn heavy_loss() {
        let mut value = interval(1_000);
        assert_eq!(steady(&mut value, &signals(15, 50, 0.0)), Decision::HeavyLoss);
        assert_eq!(value.get(), Time::from_nanos(1_428_571));
    }

    #[test]
    fn light_loss() {
        let mut value = interval(1_000);
        assert_eq!(steady(&mut value, &signals(10, 50, 0.0)), Decision::Loss);
        assert_eq!(value.get(), Time::from_nanos(1_428_571));

        let mut value = interval(1_000);
        steady(&mut value, &signals(1, 50, 0.0));
        assert_eq!(value.get(), Time::from_nanos(1_030_927));
    }

    #[test]
    fn loss_beyond_range_is_rejected() {
        let mut value = interval(9_000);
        assert_eq!(steady(&mut value, &signals(20, 50, 0.0)), Decision::HeavyLoss);
        assert_eq!(value.get(), Time::from_micros(9_000));
    }

    #[test]
    fn low_delay() {
        let mut value = interval(1_000);
        assert_eq!(steady(&mut value, &signals(0, 1, 0.0)), Decision::LowDelay);
        assert_eq!(value.get(), Time::from_micros(950));
    }

    #[test]
    fn high_delay() {
        let mut value = interval(1_000);
        assert_eq!(steady(&mut value, &signals(0, 96, 0.0)), Decision::HighDelay);
        assert_eq!(value.get(), Time::from_nanos(1_176_470));
    }

    #[test]
    fn above_target() {
        // average delay is 50.5ms, above target means more than 63.125ms
        let cases = [
            (0.06, 1_052_631),
            (0.0, 1_030_927),
            (-0.01, 1_030_927),
            (-0.03, 1_000_000),
            (-0.07, 980_000),
            (-0.2, 960_000),
        ];
        for (slope, expected) in cases {
            let mut value = interval(1_000);
            assert_eq!(
                steady(&mut value, &signals(0, 70, slope)),
                Decision::AboveTarget
            );
            assert_eq!(value.get(), Time::from_nanos(expected), "slope {slope}");
        }
    }

    #[test]
    fn below_target() {
        // below target means less than 40.4ms
        let cases = [
            (0.2, 1_052_631),
            (0.07, 1_030_927),
            (0.03, 1_000_000),
            (0.01, 980_000),
            (-0.03, 980_000),
            (-0.06, 960_000),
        ];
        for (slope, expected) in cases {
            let mut value = interval(1_000);
            assert_eq!(
                steady(&mut value, &signals(0, 20, slope)),
                Decision::BelowTarget
            );
            assert_eq!(value.get(), Time::from_nanos(expected), "slope {slope}");
        }
    }

    #[test]
    fn hold_drifts_toward_target() {
        let mut value = interval(2_000);
        assert_eq!(steady(&mut value, &signals(0, 50, 0.5)), Decision::Hold);
        // (2_000µs + 970µs * 100 / 97) / 2
        assert_eq!(value.get(), Time::from_micros(1_500));
    }
}
