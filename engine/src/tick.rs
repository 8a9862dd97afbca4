//! The dual-rate loop itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::error::EngineError;

/// Simulation rate used when the caller passes 0.
pub const DEFAULT_SIM_RATE_HZ: u32 = 60;
/// Network rate used when the caller passes 0.
pub const DEFAULT_NET_RATE_HZ: u32 = 20;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Hooks a host application registers with the engine.
///
/// `on_simulation_tick` receives the *fixed* dt (1 / simulation rate), never
/// the measured frame time, so simulation stays deterministic under timing
/// jitter.
pub trait EngineCallbacks {
    /// Runs once before the first tick. Collaborator setup (sockets, worker
    /// threads) belongs here. On error the engine returns without invoking
    /// any other callback; a failing `on_load` must release whatever it
    /// partially acquired before returning.
    fn on_load(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Runs once after the loop exits, whenever `on_load` succeeded.
    fn on_unload(&mut self);

    /// One simulation tick, at the simulation rate.
    fn on_simulation_tick(&mut self, dt: f64);

    /// One network tick, at the network rate.
    fn on_network_tick(&mut self);
}

/// Loop robustness knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Most ticks either clock may execute within one loop iteration before
    /// the remaining backlog is dropped.
    pub max_catch_up_ticks: u32,
    /// Upper bound on one measured frame. A debugger pause or OS stall
    /// longer than this turns into at most this much backlog.
    pub max_frame_ns: u64,
    /// Width of the busy-wait tail at the end of each inter-tick sleep.
    /// Larger values trade CPU for tighter tick timing; smaller values risk
    /// oversleeping past the deadline.
    pub spin_margin_ns: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_catch_up_ticks: 5,
            max_frame_ns: 250_000_000,
            spin_margin_ns: 200_000,
        }
    }
}

/// Lifecycle of a [`TickEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Initializing,
    Running,
    Stopping,
    Stopped,
}

/// Cloneable handle that asks a running engine to stop.
///
/// Callable from any thread, any number of times. The engine observes the
/// request at the top of its next loop iteration; the tick in flight always
/// completes.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Pacing arithmetic for one fixed-rate logical clock.
///
/// Accumulates measured wall time and converts it into whole ticks. After
/// `drop_backlog` the pending time never exceeds one tick duration.
#[derive(Debug)]
pub struct TickAccumulator {
    duration_ns: u64,
    backlog_ns: u64,
    tick_id: u64,
}

impl TickAccumulator {
    pub fn new(duration_ns: u64) -> Self {
        debug_assert!(duration_ns > 0);
        Self {
            duration_ns,
            backlog_ns: 0,
            tick_id: 0,
        }
    }

    /// Credits measured elapsed time.
    pub fn advance(&mut self, elapsed_ns: u64) {
        self.backlog_ns += elapsed_ns;
    }

    /// True when at least one full tick worth of time is pending.
    pub fn ready(&self) -> bool {
        self.backlog_ns >= self.duration_ns
    }

    /// Consumes one tick duration and returns the new tick id.
    pub fn consume(&mut self) -> u64 {
        debug_assert!(self.ready());
        self.backlog_ns -= self.duration_ns;
        self.tick_id += 1;
        self.tick_id
    }

    /// Clamps the backlog down to one tick duration, returning how much
    /// pending time was discarded. Called after the catch-up cap is hit so
    /// overload degrades instead of spiraling.
    pub fn drop_backlog(&mut self) -> u64 {
        if self.backlog_ns <= self.duration_ns {
            return 0;
        }
        let dropped_ns = self.backlog_ns - self.duration_ns;
        self.backlog_ns = self.duration_ns;
        dropped_ns
    }

    /// Time until the next tick is due; zero when one is already pending.
    pub fn ns_until_ready(&self) -> u64 {
        self.duration_ns.saturating_sub(self.backlog_ns)
    }

    pub fn backlog_ns(&self) -> u64 {
        self.backlog_ns
    }

    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }
}

/// Dual-rate engine. `run` blocks its caller (the simulation thread role)
/// until a stop request is observed.
pub struct TickEngine {
    config: EngineConfig,
    clock: Box<dyn Clock>,
    stop: Arc<AtomicBool>,
    state: EngineState,
}

impl TickEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Box::new(MonotonicClock::new()))
    }

    /// Injects a clock; tests use this to drive the loop deterministically.
    pub fn with_clock(config: EngineConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            stop: Arc::new(AtomicBool::new(false)),
            state: EngineState::Created,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Handle for requesting a stop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop),
        }
    }

    /// Equivalent to `stop_handle().request_stop()`.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Runs the loop at the given rates until a stop request is observed.
    ///
    /// A rate of zero falls back to the defaults. A stop requested before
    /// `run` is honored: load and unload still execute, ticks do not.
    pub fn run(
        &mut self,
        sim_rate_hz: u32,
        net_rate_hz: u32,
        callbacks: &mut dyn EngineCallbacks,
    ) -> Result<(), EngineError> {
        self.state = EngineState::Initializing;

        let sim_rate = sanitize_rate(sim_rate_hz, DEFAULT_SIM_RATE_HZ, "simulation");
        let net_rate = sanitize_rate(net_rate_hz, DEFAULT_NET_RATE_HZ, "network");

        let mut sim = TickAccumulator::new(NANOS_PER_SEC / u64::from(sim_rate));
        let mut net = TickAccumulator::new(NANOS_PER_SEC / u64::from(net_rate));
        let fixed_dt = 1.0 / f64::from(sim_rate);

        if let Err(source) = callbacks.on_load() {
            self.state = EngineState::Stopped;
            return Err(EngineError::Load(source));
        }

        self.state = EngineState::Running;
        info!(
            "engine running: simulation {} Hz, network {} Hz",
            sim_rate, net_rate
        );

        let mut last_ns = self.clock.now_ns();
        while !self.stop.load(Ordering::Relaxed) {
            let now_ns = self.clock.now_ns();
            let frame_ns = now_ns.saturating_sub(last_ns).min(self.config.max_frame_ns);
            last_ns = now_ns;

            sim.advance(frame_ns);
            net.advance(frame_ns);

            let mut executed = 0;
            while sim.ready() && executed < self.config.max_catch_up_ticks {
                sim.consume();
                callbacks.on_simulation_tick(fixed_dt);
                executed += 1;
            }
            let dropped_ns = sim.drop_backlog();
            if dropped_ns > 0 {
                warn!(
                    "simulation backlog exceeded catch-up cap ({}); dropping {} ms",
                    self.config.max_catch_up_ticks,
                    dropped_ns / 1_000_000
                );
            }

            let mut executed = 0;
            while net.ready() && executed < self.config.max_catch_up_ticks {
                net.consume();
                callbacks.on_network_tick();
                executed += 1;
            }
            let dropped_ns = net.drop_backlog();
            if dropped_ns > 0 {
                warn!(
                    "network backlog exceeded catch-up cap ({}); dropping {} ms",
                    self.config.max_catch_up_ticks,
                    dropped_ns / 1_000_000
                );
            }

            // Sleep until whichever clock is due first.
            let wait_ns = sim.ns_until_ready().min(net.ns_until_ready());
            if wait_ns > 0 {
                let target_ns = self.clock.now_ns() + wait_ns;
                self.sleep_until(target_ns);
            }
        }

        self.state = EngineState::Stopping;
        callbacks.on_unload();
        self.state = EngineState::Stopped;
        info!(
            "engine stopped after {} simulation ticks, {} network ticks",
            sim.tick_id(),
            net.tick_id()
        );
        Ok(())
    }

    // Coarse sleep for the bulk of the wait, then a short busy-wait so the
    // wake lands close to `target_ns` without relying on scheduler
    // precision.
    fn sleep_until(&self, target_ns: u64) {
        loop {
            let now_ns = self.clock.now_ns();
            if now_ns >= target_ns {
                return;
            }
            let remaining_ns = target_ns - now_ns;
            if remaining_ns > self.config.spin_margin_ns {
                self.clock.sleep_ns(remaining_ns - self.config.spin_margin_ns);
            } else {
                std::hint::spin_loop();
            }
        }
    }
}

fn sanitize_rate(rate_hz: u32, fallback_hz: u32, role: &str) -> u32 {
    if rate_hz == 0 {
        warn!(
            "invalid {} tick rate 0 Hz, falling back to {} Hz",
            role, fallback_hz
        );
        fallback_hz
    } else {
        rate_hz
    }
}
