use crate::{
    Time,
    defaults::{
        INITIAL_DELAY_MAX, INITIAL_DELAY_MIN, INITIAL_MAX_OBSERVED_INTERVAL,
        INITIAL_MIN_OBSERVED_INTERVAL,
    },
};

/// Smoothed one-way delay extremes seen over the controller's lifetime.
///
/// `min` never increases and `max` never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayBounds {
    min: Time,
    max: Time,
}

impl DelayBounds {
    pub fn min(&self) -> Time {
        self.min
    }

    pub fn max(&self) -> Time {
        self.max
    }

    /// midpoint of the two bounds
    pub fn average(&self) -> Time {
        (self.max + self.min) / 2
    }

    pub(crate) fn widen(&mut self, delay: Time) {
        self.min = self.min.min(delay);
        self.max = self.max.max(delay);
    }
}

impl Default for DelayBounds {
    fn default() -> Self {
        Self {
            min: INITIAL_DELAY_MIN,
            max: INITIAL_DELAY_MAX,
        }
    }
}

/// Receive intervals observed while the delay sat at its low and its
/// high bound.
///
/// The midpoint of the two is the interval the controller drifts toward
/// while the delay stays in its target band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalBounds {
    min_observed: Time,
    max_observed: Time,
}

impl IntervalBounds {
    pub fn min_observed(&self) -> Time {
        self.min_observed
    }

    pub fn max_observed(&self) -> Time {
        self.max_observed
    }

    pub fn target(&self) -> Time {
        (self.max_observed + self.min_observed) / 2
    }

    pub(crate) fn update(
        &mut self,
        smoothed_delay: Time,
        delay: &DelayBounds,
        recv_interval_avg: Time,
        loss_delta: u32,
    ) {
        if smoothed_delay <= delay.min() * 100 / 97 && self.min_observed > recv_interval_avg {
            self.min_observed = Time::smooth(self.min_observed, recv_interval_avg, 95, 5);
        }

        let near_max = smoothed_delay >= delay.max() * 97 / 100;
        if (near_max && self.max_observed < recv_interval_avg) || loss_delta == 0 {
            self.max_observed = Time::smooth(self.max_observed, recv_interval_avg, 9, 1);
        }
    }
}

impl Default for IntervalBounds {
    fn default() -> Self {
        Self {
            min_observed: INITIAL_MIN_OBSERVED_INTERVAL,
            max_observed: INITIAL_MAX_OBSERVED_INTERVAL,
        }
    }
}
