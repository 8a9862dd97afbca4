//! # Authoritative Game Server Runtime
//!
//! This library moves client inputs from the wire into a tick-scheduled
//! simulation and reports per-client acknowledgement state back, without
//! ever letting the network and simulation roles block each other.
//!
//! ## Two Roles, Four Pieces
//!
//! A **network role** (its own thread) polls the transport with a bounded
//! timeout, decodes each payload into a typed input, records the received
//! sequence and pushes the input, stamped with a future target tick, into
//! a mutex-guarded handoff queue. A **simulation role** (the thread that
//! calls [`session::ServerEngine::run`]) drives the dual-rate tick engine:
//! every simulation tick drains the queue in one O(1) swap, files the batch
//! into a tick-indexed scheduling ring, applies the inputs due this tick
//! and records the applied sequences; every network tick unicasts each
//! connected peer its acknowledgement status.
//!
//! The four core pieces are:
//!
//! - [`ack::AckTable`]: lock-free per-client received/applied counters
//! - [`queue::InputHandoffQueue`]: the producer/consumer handoff
//! - [`ring::ScheduledInputRing`]: input-delay scheduling by tick
//! - the tick engine from the `engine` crate, which owns all pacing
//!
//! ## Module Organization
//!
//! - [`session`]: [`session::ServerEngine`], configuration, the
//!   [`session::GameHooks`] gameplay seam and the two role implementations
//! - [`transport`]: the abstract wire seam ([`transport::Transport`],
//!   events, delivery classes)
//! - [`udp`]: datagram transport with address-keyed peer slots
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use server::session::{LoggingHooks, ServerConfig, ServerEngine};
//! use server::udp::UdpTransport;
//! use shared::JsonCodec;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let transport =
//!         UdpTransport::bind("0.0.0.0:7777", config.max_clients, Duration::from_secs(5))?;
//!     let broadcast = transport.try_clone()?;
//!
//!     let mut engine = ServerEngine::new(config);
//!     // engine.stop_handle() can stop the run from any thread.
//!     engine.run(transport, broadcast, Arc::new(JsonCodec), &mut LoggingHooks)?;
//!     Ok(())
//! }
//! ```

pub mod ack;
pub mod queue;
pub mod ring;
pub mod session;
pub mod transport;
pub mod udp;

pub use session::{GameHooks, LoggingHooks, ServerConfig, ServerEngine};
