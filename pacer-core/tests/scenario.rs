use pacer_core::{
    Decision, FeedbackEmitter, NoDelaySamples, Observer, Phase, RateController, ReceiverConfig,
    SenderConfig, Time, TracingObserver,
    sim::{PacketLoss, Simulation},
};
use std::net::SocketAddr;

#[derive(Default)]
struct Recorder {
    intervals: Vec<Time>,
    losses: Vec<u32>,
    slopes: Vec<f64>,
}

impl Observer for Recorder {
    fn pacing_interval(&mut self, interval: Time) {
        self.intervals.push(interval);
    }

    fn loss_delta(&mut self, lost: u32) {
        self.losses.push(lost);
    }

    fn trendline_slope(&mut self, slope: f64) {
        self.slopes.push(slope);
    }
}

fn receiver_addr() -> SocketAddr {
    "10.1.1.2:100".parse().unwrap()
}

fn sender_config(max_packets: u32) -> SenderConfig {
    SenderConfig::builder(receiver_addr())
        .max_packets(max_packets)
        .build()
        .unwrap()
}

#[test]
fn constant_delay_link() {
    let mut recorder = Recorder::default();
    let sender = RateController::with_observer(sender_config(100), &mut recorder);
    let receiver = FeedbackEmitter::new(ReceiverConfig::default());

    let mut sim = Simulation::builder(sender, receiver)
        .latency(Time::from_millis(10))
        .build();
    sim.start();
    sim.run_until(Time::from_millis(100));
    assert_eq!(sim.pending(), 0);
    let (sender, receiver) = sim.into_endpoints();

    assert_eq!(sender.sent(), 100);
    assert_eq!(receiver.received(), 100);
    assert_eq!(receiver.total_rx(), 100 * 1_024);
    assert_eq!(receiver.lost(), 0);
    assert_eq!(receiver.delay_average(), Ok(Time::from_millis(10)));
    assert_eq!(receiver.feedback_sent(), 7);

    // four bootstrap reports, then the delay sits on its lower bound.
    // A constant delay equals that bound on every report, so the low delay
    // rule keeps winning over the target band: the interval is pinned at
    // the floor instead of drifting toward the target interval.
    assert_eq!(sender.phase(), Phase::Steady);
    assert_eq!(sender.last_decision(), Some(Decision::LowDelay));
    assert_eq!(sender.delay_bounds().min(), Time::from_millis(10));
    assert_eq!(sender.delay_bounds().max(), Time::from_millis(10));
    assert_eq!(sender.trendline_slope(), 0.0);
    assert_eq!(sender.interval(), Time::from_nanos(200_390));
    assert!(sender.target_interval() > sender.interval());
    drop(sender);

    assert_eq!(
        recorder.intervals,
        vec![
            Time::from_micros(375),
            Time::from_nanos(281_250),
            Time::from_nanos(210_937),
            Time::from_nanos(200_390),
        ]
    );
    assert!(recorder.losses.is_empty());
    assert!(recorder.slopes.is_empty());
}

#[test]
fn periodic_loss_is_reported() {
    let mut recorder = Recorder::default();
    let sender = RateController::with_observer(sender_config(1_000), &mut recorder);
    let receiver = FeedbackEmitter::new(ReceiverConfig::default());

    let mut sim = Simulation::builder(sender, receiver)
        .latency(Time::from_millis(10))
        .packet_loss(PacketLoss::every(10).unwrap())
        .build();
    sim.start();
    sim.run();

    assert_eq!(sim.forward().dropped, 100);
    let (sender, receiver) = sim.into_endpoints();

    assert_eq!(sender.sent(), 1_000);
    assert_eq!(receiver.received(), 900);
    assert_eq!(receiver.highest_seq(), Some(998));
    // the last drops are still inside the window
    assert_eq!(receiver.lost(), 96);
    drop(sender);

    assert!(recorder.losses.iter().any(|lost| *lost > 0));
    assert!(
        recorder
            .intervals
            .iter()
            .all(|interval| (Time::from_micros(200)..=Time::from_millis(10)).contains(interval))
    );
}

#[test]
fn seeded_runs_are_reproducible() {
    let run = |seed| {
        let sender = RateController::new(sender_config(500));
        let receiver = FeedbackEmitter::new(ReceiverConfig::default());
        let mut sim = Simulation::builder(sender, receiver)
            .latency(Time::from_millis(5))
            .packet_loss(PacketLoss::rate(0.05).unwrap())
            .seed(seed)
            .build();
        sim.start();
        sim.run();
        let (sender, receiver) = sim.into_endpoints();
        (sender.interval(), sender.last_decision(), receiver.received(), receiver.lost())
    };

    assert_eq!(run(42), run(42));
}

#[test]
fn stop_halts_pacing() {
    let sender = RateController::new(sender_config(100));
    let receiver = FeedbackEmitter::new(ReceiverConfig::default());
    let mut sim = Simulation::builder(sender, receiver)
        .latency(Time::from_millis(10))
        .build();
    sim.start();
    sim.run_until(Time::from_millis(5));
    sim.stop();
    sim.run();

    assert_eq!(sim.sender().sent(), 11);
    assert!(!sim.sender().is_running());
    assert_eq!(sim.forward().delivered, 11);
    // the receiver was stopped before the first arrival
    assert_eq!(sim.receiver().received(), 0);
    assert_eq!(sim.receiver().delay_average(), Err(NoDelaySamples));
    assert_eq!(sim.pending(), 0);
}

#[test]
fn tracing_observer_runs() {
    let sender =
        RateController::with_observer(sender_config(50), TracingObserver::new("flow-0"));
    let receiver = FeedbackEmitter::with_observer(
        ReceiverConfig::default(),
        TracingObserver::new("flow-0"),
    );
    let mut sim = Simulation::builder(sender, receiver)
        .latency(Time::from_millis(2))
        .build();
    sim.start();
    sim.run();
    assert_eq!(sim.receiver().received(), 50);
}
