/*!
# Delay and loss adaptive pacing

A sender ([`RateController`]) emits small sequence-numbered probes over an
unreliable datagram transport. The receiver ([`FeedbackEmitter`]) tracks
losses in a sliding bitmap ([`LossWindow`]), measures one-way delays and
periodically reports back. Out of these reports the sender derives a
delay trend and adjusts the interval between two probes: backing off on
loss or growing delay, speeding up while the path looks idle.

The endpoints are I/O free. They are driven through the [`Endpoint`]
callbacks and reach the outside world only through a [`Context`]: the
deterministic [`sim::Simulation`] in tests and benchmarks, a UDP socket
in the `pacer` crate.

*/

mod config;
mod controller;
pub mod defaults;
mod endpoint;
mod loss_window;
mod observer;
mod receiver;
mod sampling;
pub mod sim;
mod time;
mod timer;
pub mod wire;

pub use self::{
    config::{
        ConfigError, ReceiverConfig, ReceiverConfigBuilder, SenderConfig, SenderConfigBuilder,
        parse_remote,
    },
    controller::{
        Decision, DelayBounds, IntervalBounds, PacingInterval, Phase, RateController,
    },
    endpoint::{Context, Endpoint, SendError},
    loss_window::{LossWindow, LossWindowError},
    observer::{NoopObserver, Observer, TracingObserver},
    receiver::{FeedbackEmitter, NoDelaySamples},
    sampling::{Sample, SamplingWindow, Trend},
    time::{Time, TimeParseError},
    timer::{TimerHandle, TimerQueue},
    wire::{Feedback, ProbeHeader, WireError},
};
