use crate::{Time, defaults::SMOOTHING_WEIGHTS};
use std::collections::VecDeque;

/// A `(send, receive)` timestamp pair reported by one feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub sent: Time,
    pub received: Time,
}

impl Sample {
    /// one-way delay observed for this sample
    #[inline]
    pub fn delay(&self) -> Time {
        self.received - self.sent
    }
}

/// Bounded FIFO of the most recent [`Sample`]s.
///
/// Once the window holds more than `capacity` samples the oldest are
/// evicted, so after the first `capacity` insertions the length stays
/// constant.
#[derive(Debug, Clone)]
pub struct SamplingWindow {
    samples: VecDeque<Sample>,
    capacity: usize,
}

/// Statistics computed over a full pass of the [`SamplingWindow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trend {
    /// exponentially smoothed one-way delay, the latest sample weighing 1/10
    pub smoothed_delay: Time,
    /// least squares slope of the smoothed delay variation against the
    /// receive time offset, positive when the delay grows
    pub slope: f64,
}

impl SamplingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Compute the [`Trend`] over the window.
    ///
    /// The first sample seeds the smoothed delay and is the reference
    /// point of the delay variation; every following sample contributes
    /// one point to the regression. Returns `None` on an empty window.
    ///
    /// When all the points share the same receive time the slope is
    /// undefined and reported as `0.0`.
    pub fn trend(&self) -> Option<Trend> {
        let (old, new) = SMOOTHING_WEIGHTS;
        let mut samples = self.samples.iter();
        let first = *samples.next()?;

        let mut previous = first;
        let mut smoothed_delay = first.delay();
        let mut accumulated_delay_delta = Time::ZERO;
        let mut smoothed_delay_delta = Time::ZERO;
        let mut points = Vec::with_capacity(self.samples.len());

        for sample in samples {
            smoothed_delay = Time::smooth(smoothed_delay, sample.delay(), old, new);
            accumulated_delay_delta +=
                (sample.received - previous.received) - (sample.sent - previous.sent);
            smoothed_delay_delta =
                Time::smooth(smoothed_delay_delta, accumulated_delay_delta, old, new);

            points.push((
                (sample.received - first.received).as_f64(),
                smoothed_delay_delta.as_f64(),
            ));
            previous = *sample;
        }

        let slope = least_squares_slope(&points).unwrap_or_else(|| {
            tracing::debug!(
                points = points.len(),
                "degenerate trendline, reporting a flat slope"
            );
            0.0
        });

        Some(Trend {
            smoothed_delay,
            slope,
        })
    }
}

/// Ordinary least squares slope of `y` against `x`.
///
/// `None` if there are no points or if the `x` values have no variance.
fn least_squares_slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    let count = points.len() as f64;
    let x_avg = points.iter().map(|(x, _)| x).sum::<f64>() / count;
    let y_avg = points.iter().map(|(_, y)| y).sum::<f64>() / count;

    let (numerator, denominator) =
        points
            .iter()
            .fold((0.0, 0.0), |(numerator, denominator), (x, y)| {
                let dx = x - x_avg;
                (numerator + dx * (y - y_avg), denominator + dx * dx)
            });

    let slope = numerator / denominator;
    slope.is_finite().then_some(slope)
}
