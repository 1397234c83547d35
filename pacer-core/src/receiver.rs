//! The receiving side: loss and delay accounting, feedback emission.

use crate::{
    Context, Endpoint, Feedback, LossWindow, NoopObserver, Observer, ProbeHeader,
    ReceiverConfig, Time,
};
use std::net::SocketAddr;
use thiserror::Error;

/// Returned by [`FeedbackEmitter::delay_average`] before any probe was
/// received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("No delay sample recorded yet")]
pub struct NoDelaySamples;

/// Receiver endpoint.
///
/// Every probe updates the loss window and the delay statistics. A
/// [`Feedback`] echoing the probe is sent back to its source when more
/// than the configured feedback period elapsed since the previous one.
pub struct FeedbackEmitter<O = NoopObserver> {
    config: ReceiverConfig,
    observer: O,
    window: LossWindow,
    running: bool,

    total_rx: u64,
    received: u64,
    total_delay: Time,
    delay_samples: u64,
    last_feedback: Time,
    feedback_sent: u64,
}

impl FeedbackEmitter<NoopObserver> {
    pub fn new(config: ReceiverConfig) -> Self {
        Self::with_observer(config, NoopObserver)
    }
}

impl<O: Observer> FeedbackEmitter<O> {
    pub fn with_observer(config: ReceiverConfig, observer: O) -> Self {
        // a validated configuration always holds a valid span
        let window = LossWindow::new(config.loss_window_span()).unwrap_or_default();
        Self {
            config,
            observer,
            window,
            running: false,
            total_rx: 0,
            received: 0,
            total_delay: Time::ZERO,
            delay_samples: 0,
            last_feedback: Time::ZERO,
            feedback_sent: 0,
        }
    }

    pub fn config(&self) -> &ReceiverConfig {
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

    /// bytes received, headers and padding included
    pub fn total_rx(&self) -> u64 {
        self.total_rx
    }

    /// number of probes received
    pub fn received(&self) -> u64 {
        self.received
    }

    /// number of feedback reports handed to the transport
    pub fn feedback_sent(&self) -> u64 {
        self.feedback_sent
    }

    /// Mean one-way delay over every received probe.
    ///
    /// ```
    /// # use pacer_core::{FeedbackEmitter, NoDelaySamples, ReceiverConfig};
    /// let receiver = FeedbackEmitter::new(ReceiverConfig::default());
    /// assert_eq!(receiver.delay_average(), Err(NoDelaySamples));
    /// ```
    pub fn delay_average(&self) -> Result<Time, NoDelaySamples> {
        let samples = i64::try_from(self.delay_samples).map_err(|_| NoDelaySamples)?;
        if samples == 0 {
            return Err(NoDelaySamples);
        }
        Ok(self.total_delay / samples)
    }

    /// cumulative number of sequence numbers declared lost
    pub fn lost(&self) -> u32 {
        self.window.lost()
    }

    pub fn bitmap_size(&self) -> u16 {
        self.window.bitmap_size()
    }

    /// Resize the loss window. The bitmap restarts empty, the loss
    /// counter is kept.
    pub fn set_bitmap_size(&mut self, span: u16) -> Result<(), crate::LossWindowError> {
        self.window.set_bitmap_size(span)
    }

    /// highest sequence number received so far
    pub fn highest_seq(&self) -> Option<u32> {
        self.window.highest()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn on_probe<C: Context + ?Sized>(&mut self, ctx: &mut C, from: SocketAddr, header: ProbeHeader) {
        let now = ctx.now();
        let Some(delay) = now.checked_sub(header.send_timestamp) else {
            tracing::warn!(
                seq = header.seq,
                send_timestamp = header.send_timestamp.as_nanos(),
                %from,
                "probe timestamp out of range, discarded"
            );
            return;
        };

        self.total_delay += delay;
        self.delay_samples += 1;
        self.received += 1;
        self.window.notify_received(header.seq);
        self.observer.packet_delay(delay);

        tracing::trace!(seq = header.seq, %delay, lost = self.window.lost(), "probe received");

        if now - self.last_feedback > self.config.feedback_period() {
            self.send_feedback(ctx, from, now, header);
        }
    }

    fn send_feedback<C: Context + ?Sized>(
        &mut self,
        ctx: &mut C,
        to: SocketAddr,
        now: Time,
        echo: ProbeHeader,
    ) {
        let feedback = Feedback {
            receiver_timestamp: now,
            cumulative_lost: self.window.lost(),
            echo,
        };
        self.last_feedback = now;

        match ctx.send_to(to, &feedback.to_bytes()) {
            Ok(()) => {
                self.feedback_sent += 1;
                tracing::debug!(
                    seq = echo.seq,
                    lost = feedback.cumulative_lost,
                    %to,
                    "feedback sent"
                );
            }
            Err(error) => {
                tracing::warn!(%error, seq = echo.seq, %to, "failed to send feedback");
            }
        }
    }
}

impl<O: Observer> Endpoint for FeedbackEmitter<O> {
    fn start<C: Context + ?Sized>(&mut self, ctx: &mut C) {
        self.running = true;
        tracing::info!(
            local = %ctx.local_addr(),
            span = self.window.bitmap_size(),
            period = %self.config.feedback_period(),
            "receiver started"
        );
    }

    fn stop<C: Context + ?Sized>(&mut self, _ctx: &mut C) {
        if self.running {
            self.running = false;
            tracing::info!(
                received = self.received,
                lost = self.window.lost(),
                total_rx = self.total_rx,
                "receiver stopped"
            );
        }
    }

    fn on_datagram<C: Context + ?Sized>(&mut self, ctx: &mut C, from: SocketAddr, payload: &[u8]) {
        if !self.running || payload.is_empty() {
            return;
        }
        self.total_rx += payload.len() as u64;
        self.observer.packet_received(payload, from, ctx.local_addr());

        match ProbeHeader::from_bytes(payload) {
            Ok(header) => self.on_probe(ctx, from, header),
            Err(error) => {
                tracing::warn!(%error, %from, bytes = payload.len(), "discarding malformed probe");
            }
        }
    }
}
