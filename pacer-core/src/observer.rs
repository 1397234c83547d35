use crate::Time;
use std::net::SocketAddr;

/// Read-only hooks into the endpoints' internal values.
///
/// Every method has a no-op default so an observer only implements what
/// it cares about. The sender's hooks fire when the observed value
/// changes, the receiver's hooks fire on every received probe.
#[allow(unused_variables)]
pub trait Observer {
    /// the trendline slope was recomputed
    fn trendline_slope(&mut self, slope: f64) {}

    /// the pacing interval was updated
    fn pacing_interval(&mut self, interval: Time) {}

    /// number of losses reported since the previous feedback
    fn loss_delta(&mut self, lost: u32) {}

    /// the target interval was recomputed
    fn target_interval(&mut self, interval: Time) {}

    /// a datagram reached the receiver
    fn packet_received(&mut self, payload: &[u8], from: SocketAddr, local: SocketAddr) {}

    /// one-way delay of a received probe
    fn packet_delay(&mut self, delay: Time) {}
}

/// An [`Observer`] that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// An [`Observer`] emitting every value as a `tracing` event.
///
/// Events are emitted at `TRACE` level under the `pacer::trace` target,
/// tagged with the configured flow label.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    flow: String,
}

impl TracingObserver {
    pub fn new(flow: impl Into<String>) -> Self {
        Self { flow: flow.into() }
    }
}

impl Observer for TracingObserver {
    fn trendline_slope(&mut self, slope: f64) {
        tracing::trace!(target: "pacer::trace", flow = %self.flow, slope, "trendline");
    }

    fn pacing_interval(&mut self, interval: Time) {
        tracing::trace!(target: "pacer::trace", flow = %self.flow, us = interval.as_micros(), "interval");
    }

    fn loss_delta(&mut self, lost: u32) {
        tracing::trace!(target: "pacer::trace", flow = %self.flow, lost, "lost");
    }

    fn target_interval(&mut self, interval: Time) {
        tracing::trace!(target: "pacer::trace", flow = %self.flow, us = interval.as_micros(), "target");
    }

    fn packet_received(&mut self, payload: &[u8], from: SocketAddr, local: SocketAddr) {
        tracing::trace!(target: "pacer::trace", flow = %self.flow, bytes = payload.len(), %from, %local, "rx");
    }

    fn packet_delay(&mut self, delay: Time) {
        tracing::trace!(target: "pacer::trace", flow = %self.flow, ms = delay.as_millis(), "delay");
    }
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn trendline_slope(&mut self, slope: f64) {
        (**self).trendline_slope(slope)
    }

    fn pacing_interval(&mut self, interval: Time) {
        (**self).pacing_interval(interval)
    }

    fn loss_delta(&mut self, lost: u32) {
        (**self).loss_delta(lost)
    }

    fn target_interval(&mut self, interval: Time) {
        (**self).target_interval(interval)
    }

    fn packet_received(&mut self, payload: &[u8], from: SocketAddr, local: SocketAddr) {
        (**self).packet_received(payload, from, local)
    }

    fn packet_delay(&mut self, delay: Time) {
        (**self).packet_delay(delay)
    }
}
