use crate::stop::Stop;
use anyhow::{Context as _, Result, bail};
use pacer_core::{Context, Endpoint, SendError, Time, TimerHandle, TimerQueue};
use std::{
    io,
    net::{SocketAddr, UdpSocket},
    sync::Arc,
    thread::JoinHandle,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// longest the thread waits on the socket before looking at its timers
/// and at the stop signal again
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// the socket rejects a zero read timeout
const MIN_WAIT: Duration = Duration::from_micros(20);

const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Drives an [`Endpoint`] on a UDP socket from a dedicated thread.
///
/// ```no_run
/// use pacer::{FeedbackEmitter, ReceiverConfig, Runner};
///
/// # fn main() -> anyhow::Result<()> {
/// let receiver = FeedbackEmitter::new(ReceiverConfig::default());
/// let runner = Runner::spawn(receiver, "0.0.0.0:9000".parse()?)?;
/// std::thread::sleep(std::time::Duration::from_secs(10));
/// let receiver = runner.shutdown()?;
/// println!("received {} probes", receiver.received());
/// # Ok(()) }
/// ```
pub struct Runner<E> {
    local_addr: SocketAddr,

    stop: Arc<Stop>,

    thread: JoinHandle<Result<E>>,
}

/// [`Context`] of an endpoint driven by a [`Runner`].
///
/// The clock counts nanoseconds since the UNIX epoch so that two runners
/// on the same host share their time base.
struct UdpContext {
    socket: UdpSocket,
    local_addr: SocketAddr,
    timers: TimerQueue<()>,
}

struct Driver<E> {
    endpoint: E,
    ctx: UdpContext,
    stop: Arc<Stop>,
}

impl<E> Runner<E>
where
    E: Endpoint + Send + 'static,
{
    /// Bind `bind_addr` and start driving `endpoint` from a new thread.
    ///
    /// Failing to bind is not retried.
    pub fn spawn(endpoint: E, bind_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr)
            .with_context(|| format!("Failed to bind UDP socket on {bind_addr}"))?;
        let local_addr = socket
            .local_addr()
            .context("Failed to query the bound address")?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .context("Failed to set the socket read timeout")?;

        let stop = Arc::new(Stop::new());
        let driver = Driver {
            endpoint,
            ctx: UdpContext {
                socket,
                local_addr,
                timers: TimerQueue::new(),
            },
            stop: Arc::clone(&stop),
        };

        let thread = std::thread::Builder::new()
            .name(format!("pacer {local_addr}"))
            .spawn(move || driver_run(driver))
            .context("Failed to spawn the endpoint thread")?;

        tracing::debug!(%local_addr, "runner spawned");

        Ok(Self {
            local_addr,
            stop,
            thread,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `true` if the thread exited on its own, on error
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Stop the endpoint and give it back.
    ///
    /// The endpoint's `stop` runs on the runner's thread before it exits,
    /// so its pending tick is cancelled.
    pub fn shutdown(self) -> Result<E> {
        self.stop.toggle();

        match self.thread.join() {
            Err(join_error) => {
                bail!("Runner on {} failed to shut down cleanly: {join_error:?}", self.local_addr)
            }
            Ok(Err(error)) => Err(error).context("Runner failed with error"),
            Ok(Ok(endpoint)) => Ok(endpoint),
        }
    }
}

impl UdpContext {
    /// how long to wait on the socket before the next timer is due
    fn wait(&mut self) -> Duration {
        match self.timers.next_due() {
            None => POLL_INTERVAL,
            Some(due) => (due - self.now())
                .into_duration()
                .clamp(MIN_WAIT, POLL_INTERVAL),
        }
    }
}

impl Context for UdpContext {
    fn now(&self) -> Time {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .into()
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn send_to(&mut self, to: SocketAddr, payload: &[u8]) -> Result<(), SendError> {
        self.socket
            .send_to(payload, to)
            .map(|_| ())
            .map_err(|source| SendError::Io {
                to,
                size: payload.len(),
                source,
            })
    }

    fn schedule(&mut self, after: Time) -> TimerHandle {
        let due = self.now() + after;
        self.timers.push(due, ())
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.timers.cancel(handle);
    }
}

fn driver_run<E>(driver: Driver<E>) -> Result<E>
where
    E: Endpoint,
{
    let Driver {
        mut endpoint,
        mut ctx,
        stop,
    } = driver;
    let mut buffer = vec![0; MAX_DATAGRAM_SIZE];

    endpoint.start(&mut ctx);

    while !stop.get() {
        let now = ctx.now();
        while let Some((_, handle, ())) = ctx.timers.pop_elapsed(now) {
            endpoint.on_tick(&mut ctx, handle);
        }

        let wait = ctx.wait();
        ctx.socket
            .set_read_timeout(Some(wait))
            .context("Failed to set the socket read timeout")?;

        match ctx.socket.recv_from(&mut buffer) {
            Ok((size, from)) => endpoint.on_datagram(&mut ctx, from, &buffer[..size]),
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) => {}
            Err(error) if error.kind() == io::ErrorKind::ConnectionReset => {
                // an earlier datagram bounced back as ICMP port unreachable
                tracing::debug!(%error, local = %ctx.local_addr, "peer unreachable");
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("Failed to receive on {}", ctx.local_addr));
            }
        }
    }

    endpoint.stop(&mut ctx);
    tracing::debug!(local = %ctx.local_addr, "runner stopped");

    Ok(endpoint)
}
