//! Transport seam between the server runtime and the wire.

use std::io;
use std::time::Duration;

/// Transport-assigned client identity. Implementations must keep ids below
/// their configured peer capacity so callers can use them as table indices.
pub type PeerId = u32;

/// Delivery guarantee requested for an outgoing payload. Datagram
/// transports without a reliable mode may treat both variants the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Reliable,
    Unreliable,
}

/// Event surfaced by one transport poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(PeerId),
    Disconnected(PeerId),
    Received { peer: PeerId, payload: Vec<u8> },
}

/// Wire endpoint the server runtime drives.
///
/// Two handles over one endpoint run concurrently: the network role polls
/// on one while the engine thread broadcasts on another. Implementations
/// must make independent handles cheap and must never let a send wait on a
/// blocked poll.
pub trait Transport: Send {
    /// Waits up to `timeout` for traffic and appends the resulting events.
    /// A bounded wait, never an unbounded block: the caller checks its
    /// stop flag between polls.
    fn poll(&mut self, timeout: Duration, events: &mut Vec<TransportEvent>) -> io::Result<()>;

    /// Sends one payload to one peer.
    fn send(&mut self, peer: PeerId, payload: &[u8], delivery: Delivery) -> io::Result<()>;

    /// Pushes any buffered outgoing data to the wire.
    fn flush(&mut self) -> io::Result<()>;

    /// Ids of the peers currently connected.
    fn connected_peers(&self) -> Vec<PeerId>;
}
