//! The sending side: self-clocked probe emission and interval control.

mod bounds;
mod policy;

pub use self::{
    bounds::{DelayBounds, IntervalBounds},
    policy::{Decision, PacingInterval},
};

use self::policy::Signals;
use crate::{
    Context, Endpoint, Feedback, NoopObserver, Observer, ProbeHeader, SenderConfig, Time,
    TimerHandle,
    defaults::{INITIAL_TARGET_INTERVAL, SAMPLING_WINDOW_MAX, SAMPLING_WINDOW_MIN, SMOOTHING_WEIGHTS},
    sampling::{Sample, SamplingWindow},
};
use std::net::SocketAddr;

/// Phase of a [`RateController`].
///
/// The controller moves from `Bootstrap` to `Steady` once its sampling
/// window holds enough samples, and never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Bootstrap,
    Steady,
}

/// Sender endpoint.
///
/// Sends one probe per tick and schedules the next tick after the pacing
/// interval in effect at send time. Every feedback from the receiver is
/// added to a sampling window from which the delay trend is derived, and
/// the pacing interval is adjusted multiplicatively according to the
/// reported loss and the delay trend.
pub struct RateController<O = NoopObserver> {
    config: SenderConfig,
    observer: O,

    /// number of probes sent, also the next sequence number
    sent: u32,
    interval: PacingInterval,
    pending_tick: Option<TimerHandle>,
    running: bool,

    phase: Phase,
    samples: SamplingWindow,
    previous_lost: u32,
    loss_delta: u32,
    recv_interval_avg: Time,

    trendline_slope: f64,
    delay_bounds: DelayBounds,
    interval_bounds: IntervalBounds,
    target_interval: Time,
    last_decision: Option<Decision>,
}

impl RateController<NoopObserver> {
    pub fn new(config: SenderConfig) -> Self {
        Self::with_observer(config, NoopObserver)
    }
}

impl<O: Observer> RateController<O> {
    pub fn with_observer(config: SenderConfig, observer: O) -> Self {
        Self {
            config,
            observer,
            sent: 0,
            interval: PacingInterval::default(),
            pending_tick: None,
            running: false,
            phase: Phase::Bootstrap,
            samples: SamplingWindow::new(SAMPLING_WINDOW_MAX),
            previous_lost: 0,
            loss_delta: 0,
            recv_interval_avg: Time::ZERO,
            trendline_slope: 0.0,
            delay_bounds: DelayBounds::default(),
            interval_bounds: IntervalBounds::default(),
            target_interval: INITIAL_TARGET_INTERVAL,
            last_decision: None,
        }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// number of probes handed to the transport so far
    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn interval(&self) -> Time {
        self.interval.get()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn trendline_slope(&self) -> f64 {
        self.trendline_slope
    }

    /// losses reported by the latest feedback
    pub fn loss_delta(&self) -> u32 {
        self.loss_delta
    }

    pub fn recv_interval_avg(&self) -> Time {
        self.recv_interval_avg
    }

    pub fn delay_bounds(&self) -> DelayBounds {
        self.delay_bounds
    }

    pub fn interval_bounds(&self) -> IntervalBounds {
        self.interval_bounds
    }

    pub fn target_interval(&self) -> Time {
        self.target_interval
    }

    pub fn last_decision(&self) -> Option<Decision> {
        self.last_decision
    }

    pub fn samples(&self) -> &SamplingWindow {
        &self.samples
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn send_probe<C: Context + ?Sized>(&mut self, ctx: &mut C) {
        let header = ProbeHeader::new(self.sent, ctx.now(), self.interval.get());
        let datagram = header.encode_with_padding(self.config.packet_size() as usize);
        let remote = self.config.remote();

        match ctx.send_to(remote, &datagram) {
            Ok(()) => {
                self.sent = self.sent.wrapping_add(1);
                tracing::trace!(
                    seq = header.seq,
                    bytes = datagram.len(),
                    %remote,
                    at = %header.send_timestamp,
                    "probe sent"
                );
            }
            Err(error) => {
                tracing::warn!(%error, seq = header.seq, %remote, "failed to send probe");
            }
        }
    }

    /// Process one feedback report.
    ///
    /// This is the whole control loop: the sample is recorded, the trend
    /// and bounds are recomputed, and one rule of the decision table is
    /// applied to the pacing interval. A report whose one-way delay does
    /// not fit in a [`Time`] is discarded.
    pub fn on_feedback(&mut self, feedback: &Feedback) {
        let (old, new) = SMOOTHING_WEIGHTS;

        if feedback
            .receiver_timestamp
            .checked_sub(feedback.echo.send_timestamp)
            .is_none()
        {
            tracing::warn!(
                seq = feedback.echo.seq,
                sent = feedback.echo.send_timestamp.as_nanos(),
                received = feedback.receiver_timestamp.as_nanos(),
                "feedback delay out of range, discarded"
            );
            return;
        }

        self.samples.push(Sample {
            sent: feedback.echo.send_timestamp,
            received: feedback.receiver_timestamp,
        });

        let loss_delta = feedback.cumulative_lost.saturating_sub(self.previous_lost);
        self.previous_lost = self.previous_lost.max(feedback.cumulative_lost);
        self.set_loss_delta(loss_delta);

        self.recv_interval_avg = Time::smooth(self.recv_interval_avg, feedback.echo.interval, old, new);

        if self.phase == Phase::Bootstrap && self.samples.len() >= SAMPLING_WINDOW_MIN {
            tracing::debug!(samples = self.samples.len(), "leaving bootstrap");
            self.phase = Phase::Steady;
        }

        let previous_interval = self.interval.get();
        let decision = match self.phase {
            Phase::Bootstrap => policy::bootstrap(&mut self.interval),
            Phase::Steady => self.steady(),
        };
        self.last_decision = Some(decision);

        let interval = self.interval.get();
        if interval != previous_interval {
            self.observer.pacing_interval(interval);
        }

        tracing::debug!(
            %decision,
            seq = feedback.echo.seq,
            loss_delta,
            slope = self.trendline_slope,
            from = %previous_interval,
            to = %interval,
            "feedback processed"
        );
    }

    fn steady(&mut self) -> Decision {
        let Some(trend) = self.samples.trend() else {
            // the window is never empty once steady
            return policy::bootstrap(&mut self.interval);
        };

        if trend.slope != self.trendline_slope {
            self.trendline_slope = trend.slope;
            self.observer.trendline_slope(trend.slope);
        }

        self.delay_bounds.widen(trend.smoothed_delay);
        self.interval_bounds.update(
            trend.smoothed_delay,
            &self.delay_bounds,
            self.recv_interval_avg,
            self.loss_delta,
        );

        let target = self.interval_bounds.target();
        if target != self.target_interval {
            self.target_interval = target;
            self.observer.target_interval(target);
        }

        policy::steady(
            &mut self.interval,
            &Signals {
                loss_delta: self.loss_delta,
                smoothed_delay: trend.smoothed_delay,
                delay: self.delay_bounds,
                slope: self.trendline_slope,
                target_interval: self.target_interval,
            },
        )
    }

    fn set_loss_delta(&mut self, loss_delta: u32) {
        if loss_delta != self.loss_delta {
            self.loss_delta = loss_delta;
            self.observer.loss_delta(loss_delta);
        }
    }
}

impl<O: Observer> Endpoint for RateController<O> {
    fn start<C: Context + ?Sized>(&mut self, ctx: &mut C) {
        if self.running {
            return;
        }
        self.running = true;
        tracing::info!(
            remote = %self.config.remote(),
            max_packets = self.config.max_packets(),
            packet_size = self.config.packet_size(),
            "sender started"
        );
        if self.sent < self.config.max_packets() {
            self.pending_tick = Some(ctx.schedule(Time::ZERO));
        }
    }

    fn stop<C: Context + ?Sized>(&mut self, ctx: &mut C) {
        if let Some(handle) = self.pending_tick.take() {
            ctx.cancel(handle);
        }
        if self.running {
            self.running = false;
            tracing::info!(sent = self.sent, interval = %self.interval.get(), "sender stopped");
        }
    }

    fn on_tick<C: Context + ?Sized>(&mut self, ctx: &mut C, handle: TimerHandle) {
        if !self.running || self.pending_tick != Some(handle) {
            tracing::trace!(?handle, "ignoring stale tick");
            return;
        }
        self.pending_tick = None;

        self.send_probe(ctx);

        if self.sent < self.config.max_packets() {
            self.pending_tick = Some(ctx.schedule(self.interval.get()));
        } else {
            tracing::debug!(sent = self.sent, "all probes sent");
        }
    }

    fn on_datagram<C: Context + ?Sized>(&mut self, _ctx: &mut C, from: SocketAddr, payload: &[u8]) {
        if !self.running {
            return;
        }
        match Feedback::from_bytes(payload) {
            Ok(feedback) => self.on_feedback(&feedback),
            Err(error) => {
                tracing::warn!(%error, %from, bytes = payload.len(), "discarding malformed feedback");
            }
        }
    }
}
