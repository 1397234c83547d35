/*!
# Pacer

Runs the endpoints of [`pacer_core`] over real UDP sockets.

Each [`Runner`] owns one socket and one thread. The thread delivers the
received datagrams and fires the timers of its endpoint until the runner
is shut down, at which point the endpoint is handed back for inspection.

*/

mod runner;
mod stop;

pub use self::runner::Runner;

// convenient re-export of the `pacer_core` endpoints and their configuration
pub use pacer_core::{
    ConfigError, Decision, Endpoint, FeedbackEmitter, NoopObserver, Observer, RateController,
    ReceiverConfig, SenderConfig, Time, TracingObserver, parse_remote,
};
