use crate::{Time, TimerHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Error returned by [`Context::send_to`].
///
/// A failed send is never fatal to an endpoint: the datagram is
/// dropped and the endpoint carries on.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Failed to send {size} bytes to {to}")]
    Io {
        to: SocketAddr,
        size: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("No route to {to}")]
    Unreachable { to: SocketAddr },
}

/// The services an [`Endpoint`] gets from the layer driving it.
///
/// The driver owns the clock, the socket and the timers; endpoints only
/// ever react to the callbacks of [`Endpoint`] and never block.
pub trait Context {
    /// current reading of the local clock
    fn now(&self) -> Time;

    /// address the endpoint's socket is bound to
    fn local_addr(&self) -> SocketAddr;

    fn send_to(&mut self, to: SocketAddr, payload: &[u8]) -> Result<(), SendError>;

    /// Arrange for [`Endpoint::on_tick`] to be called `after` from now
    /// with the returned handle.
    fn schedule(&mut self, after: Time) -> TimerHandle;

    /// Cancel a scheduled tick. Once this returns, the tick will not be
    /// delivered.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Lifecycle and event handlers shared by the sender and the receiver.
pub trait Endpoint {
    fn start<C: Context + ?Sized>(&mut self, ctx: &mut C);

    fn stop<C: Context + ?Sized>(&mut self, ctx: &mut C);

    /// A tick scheduled through [`Context::schedule`] is due.
    #[allow(unused_variables)]
    fn on_tick<C: Context + ?Sized>(&mut self, ctx: &mut C, handle: TimerHandle) {}

    /// A datagram was received from `from`.
    fn on_datagram<C: Context + ?Sized>(&mut self, ctx: &mut C, from: SocketAddr, payload: &[u8]);
}
