use crate::Time;

/// Pacing interval of a freshly started sender.
///
/// ```
/// # use pacer_core::defaults::*;
/// assert_eq!(INITIAL_INTERVAL.to_string(), "500µs");
/// ```
pub const INITIAL_INTERVAL: Time = Time::from_micros(500);

/// Smallest pacing interval a sender accepts (inclusive).
pub const MIN_INTERVAL: Time = Time::from_micros(200);

/// Largest pacing interval a sender accepts (inclusive).
pub const MAX_INTERVAL: Time = Time::from_millis(10);

/// Starting point of the lower delay bound. It only ever decreases.
pub const INITIAL_DELAY_MIN: Time = Time::from_millis(1_000);

/// Starting point of the upper delay bound. It only ever increases.
pub const INITIAL_DELAY_MAX: Time = Time::ZERO;

/// Starting point of the interval observed at low delay.
pub const INITIAL_MIN_OBSERVED_INTERVAL: Time = Time::from_micros(10_000);

/// Starting point of the interval observed at high delay.
pub const INITIAL_MAX_OBSERVED_INTERVAL: Time = Time::from_micros(200);

/// Target interval reported before the controller left the bootstrap phase.
pub const INITIAL_TARGET_INTERVAL: Time = Time::from_millis(1_000);

/// Number of samples needed before the trendline is computed.
pub const SAMPLING_WINDOW_MIN: usize = 5;

/// Maximum number of samples kept by the sender.
pub const SAMPLING_WINDOW_MAX: usize = 30;

/// `(old, new)` weights of the exponential smoothing used for delays and
/// receive intervals.
pub const SMOOTHING_WEIGHTS: (i64, i64) = (9, 1);

/// Minimum time between two feedback reports of a receiver.
///
/// ```
/// # use pacer_core::defaults::*;
/// assert_eq!(DEFAULT_FEEDBACK_PERIOD.to_string(), "5ms");
/// ```
pub const DEFAULT_FEEDBACK_PERIOD: Time = Time::from_millis(5);

/// Default number of probes a sender emits.
pub const DEFAULT_MAX_PACKETS: u32 = 100;

/// Default size of a probe datagram, header included.
pub const DEFAULT_PACKET_SIZE: u32 = 1_024;

/// Smallest probe size a sender can be configured with.
pub const MIN_PACKET_SIZE: u32 = 12;

/// Largest UDP payload over IPv4.
pub const MAX_PACKET_SIZE: u32 = 65_507;

/// Default port a receiver listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 100;

/// Default span of the receiver's loss window.
pub const DEFAULT_LOSS_WINDOW_SPAN: u16 = 32;
