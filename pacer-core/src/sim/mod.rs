//! Deterministic simulation of a sender and a receiver joined by a link.
//!
//! Both endpoints run against a virtual clock. Timers and datagram
//! deliveries share a single [`TimerQueue`], so events are processed
//! strictly in time order and a run is reproducible from its seed.
//!
//! ```
//! use pacer_core::{
//!     FeedbackEmitter, RateController, ReceiverConfig, SenderConfig, Time,
//!     sim::Simulation,
//! };
//!
//! let receiver_addr = "10.1.1.2:100".parse().unwrap();
//! let sender = RateController::new(SenderConfig::builder(receiver_addr).build().unwrap());
//! let receiver = FeedbackEmitter::new(ReceiverConfig::default());
//!
//! let mut sim = Simulation::builder(sender, receiver)
//!     .receiver_addr(receiver_addr)
//!     .latency(Time::from_millis(10))
//!     .build();
//! sim.start();
//! sim.run();
//!
//! assert_eq!(sim.receiver().received(), 100);
//! ```

mod packet_loss;

pub use self::packet_loss::{LossRate, PacketLoss, PacketLossError};

use crate::{Context, Endpoint, SendError, Time, TimerHandle, TimerQueue};
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng as _;
use std::net::{Ipv4Addr, SocketAddr};

const DEFAULT_SENDER_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::new(10, 1, 1, 1)),
    49153,
);
const DEFAULT_RECEIVER_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::new(10, 1, 1, 2)),
    100,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Sender,
    Receiver,
}

enum Event {
    Tick(Side),
    Deliver {
        to: Side,
        from: SocketAddr,
        payload: Vec<u8>,
    },
}

/// Counters of one direction of the link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub delivered: u64,
    pub dropped: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    latency: Time,
    loss: PacketLoss,
}

pub struct SimulationBuilder<S, R> {
    sender: S,
    receiver: R,
    sender_addr: SocketAddr,
    receiver_addr: SocketAddr,
    link: Link,
    seed: u64,
}

impl<S, R> SimulationBuilder<S, R> {
    pub fn sender_addr(mut self, addr: SocketAddr) -> Self {
        self.sender_addr = addr;
        self
    }

    pub fn receiver_addr(mut self, addr: SocketAddr) -> Self {
        self.receiver_addr = addr;
        self
    }

    /// one-way latency, the same in both directions
    pub fn latency(mut self, latency: Time) -> Self {
        self.link.latency = latency;
        self
    }

    pub fn packet_loss(mut self, loss: PacketLoss) -> Self {
        self.link.loss = loss;
        self
    }

    /// seed of the generator behind [`PacketLoss::Rate`]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Simulation<S, R> {
        Simulation {
            sender: self.sender,
            receiver: self.receiver,
            sender_addr: self.sender_addr,
            receiver_addr: self.receiver_addr,
            link: self.link,
            rng: ChaChaRng::seed_from_u64(self.seed),
            events: TimerQueue::new(),
            now: Time::ZERO,
            forward: LinkStats::default(),
            backward: LinkStats::default(),
        }
    }
}

/// A sender and a receiver exchanging datagrams over a simulated link.
pub struct Simulation<S, R> {
    sender: S,
    receiver: R,
    sender_addr: SocketAddr,
    receiver_addr: SocketAddr,
    link: Link,
    rng: ChaChaRng,
    events: TimerQueue<Event>,
    now: Time,
    forward: LinkStats,
    backward: LinkStats,
}

/// The [`Context`] one side of the simulation sees.
struct SimContext<'a> {
    side: Side,
    now: Time,
    local: SocketAddr,
    peer: SocketAddr,
    link: Link,
    rng: &'a mut ChaChaRng,
    events: &'a mut TimerQueue<Event>,
    stats: &'a mut LinkStats,
}

impl Context for SimContext<'_> {
    fn now(&self) -> Time {
        self.now
    }

    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    fn send_to(&mut self, to: SocketAddr, payload: &[u8]) -> Result<(), SendError> {
        if to != self.peer {
            return Err(SendError::Unreachable { to });
        }

        let offered = self.stats.delivered + self.stats.dropped + 1;
        if self.link.loss.should_drop(offered, &mut *self.rng) {
            self.stats.dropped += 1;
            tracing::trace!(from = %self.local, %to, bytes = payload.len(), "dropped in transit");
            return Ok(());
        }

        self.stats.delivered += 1;
        self.stats.bytes += payload.len() as u64;
        let to = match self.side {
            Side::Sender => Side::Receiver,
            Side::Receiver => Side::Sender,
        };
        self.events.push(
            self.now + self.link.latency,
            Event::Deliver {
                to,
                from: self.local,
                payload: payload.to_vec(),
            },
        );
        Ok(())
    }

    fn schedule(&mut self, after: Time) -> TimerHandle {
        self.events.push(self.now + after, Event::Tick(self.side))
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.events.cancel(handle);
    }
}

impl<S, R> Simulation<S, R>
where
    S: Endpoint,
    R: Endpoint,
{
    pub fn builder(sender: S, receiver: R) -> SimulationBuilder<S, R> {
        SimulationBuilder {
            sender,
            receiver,
            sender_addr: DEFAULT_SENDER_ADDR,
            receiver_addr: DEFAULT_RECEIVER_ADDR,
            link: Link {
                latency: Time::ZERO,
                loss: PacketLoss::None,
            },
            seed: 0,
        }
    }

    pub fn now(&self) -> Time {
        self.now
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    /// counters of the sender to receiver direction
    pub fn forward(&self) -> LinkStats {
        self.forward
    }

    /// counters of the receiver to sender direction
    pub fn backward(&self) -> LinkStats {
        self.backward
    }

    /// number of timers and deliveries still pending
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    pub fn into_endpoints(self) -> (S, R) {
        (self.sender, self.receiver)
    }

    /// Start the receiver, then the sender.
    pub fn start(&mut self) {
        self.with_side(Side::Receiver, |endpoint, ctx| endpoint.start(ctx), |endpoint, ctx| {
            endpoint.start(ctx)
        });
        self.with_side(Side::Sender, |endpoint, ctx| endpoint.start(ctx), |endpoint, ctx| {
            endpoint.start(ctx)
        });
    }

    /// Stop the sender, then the receiver.
    pub fn stop(&mut self) {
        self.with_side(Side::Sender, |endpoint, ctx| endpoint.stop(ctx), |endpoint, ctx| {
            endpoint.stop(ctx)
        });
        self.with_side(Side::Receiver, |endpoint, ctx| endpoint.stop(ctx), |endpoint, ctx| {
            endpoint.stop(ctx)
        });
    }

    /// Process every event due at or before `deadline`, then move the
    /// clock to `deadline`. Returns the number of events processed.
    pub fn run_until(&mut self, deadline: Time) -> usize {
        let mut processed = 0;
        while let Some(due) = self.events.next_due() {
            if due > deadline {
                break;
            }
            self.step();
            processed += 1;
        }
        self.now = self.now.max(deadline);
        processed
    }

    /// Run `duration` past the current time.
    pub fn run_for(&mut self, duration: Time) -> usize {
        self.run_until(self.now + duration)
    }

    /// Process events until none is left.
    pub fn run(&mut self) -> usize {
        let mut processed = 0;
        while self.step() {
            processed += 1;
        }
        processed
    }

    /// Process the next event. Returns `false` if there was none.
    pub fn step(&mut self) -> bool {
        let Some((due, handle, event)) = self.events.pop() else {
            return false;
        };
        self.now = due;

        match event {
            Event::Tick(side) => self.with_side(
                side,
                |endpoint, ctx| endpoint.on_tick(ctx, handle),
                |endpoint, ctx| endpoint.on_tick(ctx, handle),
            ),
            Event::Deliver { to, from, payload } => self.with_side(
                to,
                |endpoint, ctx| endpoint.on_datagram(ctx, from, &payload),
                |endpoint, ctx| endpoint.on_datagram(ctx, from, &payload),
            ),
        }
        true
    }

    fn with_side<FS, FR>(&mut self, side: Side, on_sender: FS, on_receiver: FR)
    where
        FS: FnOnce(&mut S, &mut SimContext<'_>),
        FR: FnOnce(&mut R, &mut SimContext<'_>),
    {
        let Self {
            sender,
            receiver,
            sender_addr,
            receiver_addr,
            link,
            rng,
            events,
            now,
            forward,
            backward,
        } = self;

        match side {
            Side::Sender => on_sender(
                sender,
                &mut SimContext {
                    side,
                    now: *now,
                    local: *sender_addr,
                    peer: *receiver_addr,
                    link: *link,
                    rng,
                    events,
                    stats: forward,
                },
            ),
            Side::Receiver => on_receiver(
                receiver,
                &mut SimContext {
                    side,
                    now: *now,
                    local: *receiver_addr,
                    peer: *sender_addr,
                    link: *link,
                    rng,
                    events,
                    stats: backward,
                },
            ),
        }
    }
}
