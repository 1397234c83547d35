//! Run a pacing session over UDP.
//!
//! ```text
//! # both endpoints in one process
//! cargo run --example session -- loopback --packets 1000
//!
//! # or on two hosts
//! cargo run --example session -- receiver --port 9000
//! cargo run --example session -- sender --remote 10.1.1.2 --port 9000
//! ```
//!
//! Set `RUST_LOG=pacer::trace=trace` to see every traced value.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use pacer::{
    FeedbackEmitter, RateController, ReceiverConfig, Runner, SenderConfig, Time, TracingObserver,
    parse_remote,
};
use std::net::{Ipv4Addr, SocketAddr};

#[derive(Parser)]
struct Command {
    /// how long to run before shutting the endpoints down (`500ms`, `10s`, ...)
    #[arg(long, default_value = "5s")]
    time: Time,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// sender and receiver on the loopback interface
    Loopback {
        #[arg(long, default_value = "100")]
        packets: u32,

        #[arg(long, default_value = "1024")]
        size: u32,
    },
    Receiver {
        #[arg(long, default_value = "100")]
        port: u16,

        /// loss window span, a multiple of 8 in [8, 256]
        #[arg(long, default_value = "32")]
        span: u16,
    },
    Sender {
        /// receiver address, `ip` or `ip:port`
        #[arg(long)]
        remote: String,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long, default_value = "100")]
        packets: u32,

        #[arg(long, default_value = "1024")]
        size: u32,
    },
}

fn main() -> Result<()> {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .finish(),
    )
    .context("Failed to install the tracing subscriber")?;

    let cmd = Command::parse();
    let time = cmd.time.into_duration();

    match cmd.mode {
        Mode::Loopback { packets, size } => {
            let receiver = spawn_receiver(ReceiverConfig::builder().listen_port(0).build()?, true)?;
            let config = SenderConfig::builder(receiver.local_addr())
                .max_packets(packets)
                .packet_size(size)
                .build()?;
            let sender = spawn_sender(config, true)?;

            std::thread::sleep(time);
            report_sender(sender)?;
            report_receiver(receiver)?;
        }
        Mode::Receiver { port, span } => {
            let config = ReceiverConfig::builder()
                .listen_port(port)
                .loss_window_span(span)
                .build()?;
            let receiver = spawn_receiver(config, false)?;

            std::thread::sleep(time);
            report_receiver(receiver)?;
        }
        Mode::Sender {
            remote,
            port,
            packets,
            size,
        } => {
            let remote = parse_remote(&remote, port)?;
            let config = SenderConfig::builder(remote)
                .max_packets(packets)
                .packet_size(size)
                .build()?;
            let sender = spawn_sender(config, false)?;

            std::thread::sleep(time);
            report_sender(sender)?;
        }
    }

    Ok(())
}

fn spawn_receiver(
    config: ReceiverConfig,
    loopback: bool,
) -> Result<Runner<FeedbackEmitter<TracingObserver>>> {
    let ip = if loopback {
        Ipv4Addr::LOCALHOST
    } else {
        Ipv4Addr::UNSPECIFIED
    };
    let bind = SocketAddr::from((ip, config.listen_port()));
    let receiver = FeedbackEmitter::with_observer(config, TracingObserver::new("receiver"));
    Runner::spawn(receiver, bind)
}

fn spawn_sender(
    config: SenderConfig,
    loopback: bool,
) -> Result<Runner<RateController<TracingObserver>>> {
    let ip = if loopback {
        Ipv4Addr::LOCALHOST
    } else {
        Ipv4Addr::UNSPECIFIED
    };
    let sender = RateController::with_observer(config, TracingObserver::new("sender"));
    Runner::spawn(sender, SocketAddr::from((ip, 0)))
}

fn report_sender(runner: Runner<RateController<TracingObserver>>) -> Result<()> {
    let sender = runner.shutdown()?;
    tracing::info!(
        sent = sender.sent(),
        interval = %sender.interval(),
        target = %sender.target_interval(),
        slope = sender.trendline_slope(),
        phase = ?sender.phase(),
        decision = ?sender.last_decision(),
        "sender summary"
    );
    Ok(())
}

fn report_receiver(runner: Runner<FeedbackEmitter<TracingObserver>>) -> Result<()> {
    let receiver = runner.shutdown()?;
    let delay = receiver
        .delay_average()
        .map(|delay| delay.to_string())
        .unwrap_or_else(|_| "n/a".to_owned());
    tracing::info!(
        received = receiver.received(),
        bytes = receiver.total_rx(),
        lost = receiver.lost(),
        feedback = receiver.feedback_sent(),
        %delay,
        "receiver summary"
    );
    Ok(())
}
