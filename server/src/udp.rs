//! UDP datagram transport with address-keyed peer tracking.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};
use parking_lot::Mutex;

use crate::transport::{Delivery, PeerId, Transport, TransportEvent};

/// Largest datagram accepted.
const MAX_DATAGRAM_LEN: usize = 2048;

/// Datagrams consumed per poll before yielding back to the caller, so a
/// flood cannot starve the caller's stop-flag check.
const MAX_DATAGRAMS_PER_POLL: usize = 64;

/// UDP is connectionless, so connections are inferred: a datagram from an
/// unknown address claims the lowest free peer slot (ids therefore stay in
/// `[0, max_peers)` and double as ack-table indices), and a peer that stays
/// silent longer than the idle timeout is reaped.
///
/// [`UdpTransport::try_clone`] yields a second handle sharing the peer
/// table but owning an independent socket handle, which keeps the engine
/// thread's broadcasts off the poll thread's blocking receive. The peer
/// table lock is only ever held for short map operations, never across a
/// socket call.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peers: Arc<Mutex<PeerTable>>,
    read_timeout: Option<Duration>,
}

#[derive(Debug)]
struct PeerTable {
    slots: Vec<Option<PeerEntry>>,
    by_addr: HashMap<SocketAddr, PeerId>,
    idle_timeout: Duration,
}

#[derive(Debug)]
struct PeerEntry {
    addr: SocketAddr,
    last_seen: Instant,
}

enum Arrival {
    Known(PeerId),
    New(PeerId),
    Full,
}

impl PeerTable {
    fn new(max_peers: usize, idle_timeout: Duration) -> Self {
        Self {
            slots: (0..max_peers).map(|_| None).collect(),
            by_addr: HashMap::new(),
            idle_timeout,
        }
    }

    fn note_arrival(&mut self, addr: SocketAddr, now: Instant) -> Arrival {
        if let Some(&id) = self.by_addr.get(&addr) {
            if let Some(entry) = self.slots[id as usize].as_mut() {
                entry.last_seen = now;
            }
            return Arrival::Known(id);
        }
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                let id = index as PeerId;
                self.slots[index] = Some(PeerEntry {
                    addr,
                    last_seen: now,
                });
                self.by_addr.insert(addr, id);
                Arrival::New(id)
            }
            None => Arrival::Full,
        }
    }

    fn reap_idle(&mut self, now: Instant) -> Vec<PeerId> {
        let mut reaped = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let expired = slot
                .as_ref()
                .is_some_and(|entry| now.duration_since(entry.last_seen) > self.idle_timeout);
            if expired {
                if let Some(entry) = slot.take() {
                    self.by_addr.remove(&entry.addr);
                    reaped.push(index as PeerId);
                }
            }
        }
        reaped
    }

    fn addr_of(&self, id: PeerId) -> Option<SocketAddr> {
        self.slots
            .get(id as usize)
            .and_then(|slot| slot.as_ref())
            .map(|entry| entry.addr)
    }

    fn connected(&self) -> Vec<PeerId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|_| index as PeerId))
            .collect()
    }
}

impl UdpTransport {
    /// Binds a transport accepting at most `max_peers` concurrent clients.
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        max_peers: usize,
        idle_timeout: Duration,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        info!("UDP transport listening on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            peers: Arc::new(Mutex::new(PeerTable::new(max_peers, idle_timeout))),
            read_timeout: None,
        })
    }

    /// Second handle over the same endpoint: shared peer table, cloned
    /// socket. One handle polls on the network thread while the other
    /// broadcasts from the engine thread.
    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            socket: self.socket.try_clone()?,
            peers: Arc::clone(&self.peers),
            read_timeout: None,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn poll(&mut self, timeout: Duration, events: &mut Vec<TransportEvent>) -> io::Result<()> {
        if self.read_timeout != Some(timeout) {
            self.socket.set_read_timeout(Some(timeout))?;
            self.read_timeout = Some(timeout);
        }

        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        for _ in 0..MAX_DATAGRAMS_PER_POLL {
            match self.socket.recv_from(&mut buf) {
                Ok((len, addr)) => {
                    let arrival = self.peers.lock().note_arrival(addr, Instant::now());
                    match arrival {
                        Arrival::Known(peer) => {
                            events.push(TransportEvent::Received {
                                peer,
                                payload: buf[..len].to_vec(),
                            });
                        }
                        Arrival::New(peer) => {
                            events.push(TransportEvent::Connected(peer));
                            events.push(TransportEvent::Received {
                                peer,
                                payload: buf[..len].to_vec(),
                            });
                        }
                        Arrival::Full => {
                            warn!("dropping datagram from {}: peer table full", addr);
                        }
                    }
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        for peer in self.peers.lock().reap_idle(Instant::now()) {
            events.push(TransportEvent::Disconnected(peer));
        }
        Ok(())
    }

    fn send(&mut self, peer: PeerId, payload: &[u8], _delivery: Delivery) -> io::Result<()> {
        // UDP has no reliable mode; both delivery classes go out as plain
        // datagrams.
        let addr = self.peers.lock().addr_of(peer);
        match addr {
            Some(addr) => self.socket.send_to(payload, addr).map(|_| ()),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("peer {} is not connected", peer),
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // Datagrams hit the wire on send; nothing is buffered here.
        Ok(())
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        self.peers.lock().connected()
    }
}
