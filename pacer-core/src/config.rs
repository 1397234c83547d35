//! Validated configuration of the sender and the receiver.
//!
//! Both configurations are assembled with a builder and checked once in
//! `build()`; an endpoint never sees an out of range value.
//!
//! ```
//! use pacer_core::{ReceiverConfig, SenderConfig};
//!
//! let sender = SenderConfig::builder("10.1.1.2:9".parse().unwrap())
//!     .max_packets(1_000)
//!     .packet_size(512)
//!     .build()
//!     .unwrap();
//! assert_eq!(sender.packet_size(), 512);
//!
//! let receiver = ReceiverConfig::builder()
//!     .listen_port(9)
//!     .loss_window_span(64)
//!     .build()
//!     .unwrap();
//! assert_eq!(receiver.loss_window_span(), 64);
//! ```

use crate::{
    Time,
    defaults::{
        DEFAULT_FEEDBACK_PERIOD, DEFAULT_LISTEN_PORT, DEFAULT_LOSS_WINDOW_SPAN,
        DEFAULT_MAX_PACKETS, DEFAULT_PACKET_SIZE, MAX_PACKET_SIZE, MIN_PACKET_SIZE,
    },
    loss_window::{MAX_SPAN, MIN_SPAN},
};
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Packet size must be in [{MIN_PACKET_SIZE}, {MAX_PACKET_SIZE}] bytes, got {0}")]
    PacketSize(u32),
    #[error("Loss window span must be a multiple of 8 in [{MIN_SPAN}, {MAX_SPAN}], got {0}")]
    LossWindowSpan(u16),
    #[error("Feedback period must be positive, got {0}")]
    FeedbackPeriod(Time),
    #[error("Incompatible address type: {0}")]
    UnsupportedAddress(String),
    #[error("Remote port must be given with the remote address `{0}'")]
    MissingPort(String),
}

/// Parse a remote endpoint given as `ip:port`, `[ipv6]:port`, or as a bare
/// IP address paired with `port`.
///
/// Anything that is neither an IPv4 nor an IPv6 address is rejected with
/// [`ConfigError::UnsupportedAddress`].
pub fn parse_remote(address: &str, port: Option<u16>) -> Result<SocketAddr, ConfigError> {
    let address = address.trim();
    if let Ok(socket) = address.parse::<SocketAddr>() {
        return Ok(match port {
            Some(port) => SocketAddr::new(socket.ip(), port),
            None => socket,
        });
    }
    let ip = address
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::UnsupportedAddress(address.to_owned()))?;
    let port = port.ok_or_else(|| ConfigError::MissingPort(address.to_owned()))?;
    Ok(SocketAddr::new(ip, port))
}

/// Configuration of the sending side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderConfig {
    max_packets: u32,
    remote: SocketAddr,
    packet_size: u32,
}

#[derive(Debug, Clone)]
pub struct SenderConfigBuilder {
    max_packets: u32,
    remote: SocketAddr,
    packet_size: u32,
}

impl SenderConfig {
    pub fn builder(remote: SocketAddr) -> SenderConfigBuilder {
        SenderConfigBuilder {
            max_packets: DEFAULT_MAX_PACKETS,
            remote,
            packet_size: DEFAULT_PACKET_SIZE,
        }
    }

    /// number of probes to send before the pacing loop ends
    #[inline]
    pub fn max_packets(&self) -> u32 {
        self.max_packets
    }

    #[inline]
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// size of a probe datagram in bytes, header included
    #[inline]
    pub fn packet_size(&self) -> u32 {
        self.packet_size
    }
}

impl SenderConfigBuilder {
    pub fn max_packets(mut self, max_packets: u32) -> Self {
        self.max_packets = max_packets;
        self
    }

    pub fn remote(mut self, remote: SocketAddr) -> Self {
        self.remote = remote;
        self
    }

    pub fn packet_size(mut self, packet_size: u32) -> Self {
        self.packet_size = packet_size;
        self
    }

    pub fn build(self) -> Result<SenderConfig, ConfigError> {
        let Self {
            max_packets,
            remote,
            packet_size,
        } = self;

        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&packet_size) {
            return Err(ConfigError::PacketSize(packet_size));
        }

        Ok(SenderConfig {
            max_packets,
            remote,
            packet_size,
        })
    }
}

/// Configuration of the receiving side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    listen_port: u16,
    loss_window_span: u16,
    feedback_period: Time,
}

#[derive(Debug, Clone)]
pub struct ReceiverConfigBuilder {
    listen_port: u16,
    loss_window_span: u16,
    feedback_period: Time,
}

impl ReceiverConfig {
    pub fn builder() -> ReceiverConfigBuilder {
        ReceiverConfigBuilder {
            listen_port: DEFAULT_LISTEN_PORT,
            loss_window_span: DEFAULT_LOSS_WINDOW_SPAN,
            feedback_period: DEFAULT_FEEDBACK_PERIOD,
        }
    }

    #[inline]
    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    #[inline]
    pub fn loss_window_span(&self) -> u16 {
        self.loss_window_span
    }

    /// minimum time between two feedback reports
    #[inline]
    pub fn feedback_period(&self) -> Time {
        self.feedback_period
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            loss_window_span: DEFAULT_LOSS_WINDOW_SPAN,
            feedback_period: DEFAULT_FEEDBACK_PERIOD,
        }
    }
}

impl ReceiverConfigBuilder {
    pub fn listen_port(mut self, listen_port: u16) -> Self {
        self.listen_port = listen_port;
        self
    }

    pub fn loss_window_span(mut self, span: u16) -> Self {
        self.loss_window_span = span;
        self
    }

    pub fn feedback_period(mut self, period: Time) -> Self {
        self.feedback_period = period;
        self
    }

    pub fn build(self) -> Result<ReceiverConfig, ConfigError> {
        let Self {
            listen_port,
            loss_window_span,
            feedback_period,
        } = self;

        if !(MIN_SPAN..=MAX_SPAN).contains(&loss_window_span) || loss_window_span % 8 != 0 {
            return Err(ConfigError::LossWindowSpan(loss_window_span));
        }
        if feedback_period <= Time::ZERO {
            return Err(ConfigError::FeedbackPeriod(feedback_period));
        }

        Ok(ReceiverConfig {
            listen_port,
            loss_window_span,
            feedback_period,
        })
    }
}
