//! Dual-rate fixed-timestep engine.
//!
//! The engine paces two independent logical clocks against real time on one
//! thread: a simulation tick that always receives the same fixed dt, and a
//! network tick for send cadence. The host application registers an
//! [`EngineCallbacks`] implementation and calls [`TickEngine::run`], which
//! blocks until a stop is requested from any thread via a [`StopHandle`].
//!
//! The loop measures elapsed wall time on a monotonic clock, clamps stalls,
//! credits both accumulators and drains each with a bounded catch-up. When
//! sustained overload exceeds the catch-up cap the excess backlog is
//! deliberately dropped instead of queueing without bound.

pub mod clock;
pub mod error;
pub mod tick;

pub use clock::{Clock, MonotonicClock};
pub use error::EngineError;
pub use tick::{
    EngineCallbacks, EngineConfig, EngineState, StopHandle, TickAccumulator, TickEngine,
    DEFAULT_NET_RATE_HZ, DEFAULT_SIM_RATE_HZ,
};
