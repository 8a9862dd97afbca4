//! Server runtime: owns the input pipeline and wires the two thread roles.
//!
//! The simulation role is the caller of [`ServerEngine::run`], which drives
//! the tick engine. The network role is a thread spawned at engine load: it
//! polls the transport with a bounded timeout, decodes inputs, stamps each
//! with a target tick (current simulation tick + input delay) and pushes it
//! into the handoff queue. Each simulation tick drains that queue, files
//! the batch into the scheduling ring and applies whatever the ring holds
//! for the tick being executed. Each network tick unicasts one
//! acknowledgement status per connected peer from the engine thread over a
//! second transport handle.
//!
//! Cross-thread facts travel only through the ack table's atomics, the
//! handoff queue, the shared simulation tick counter and the stop flags;
//! the scheduling ring is touched by the simulation role alone.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use engine::{EngineCallbacks, EngineConfig, EngineError, StopHandle, TickEngine};
use shared::{ClientInput, Codec, StatusPayload, MAX_CLIENTS};

use crate::ack::AckTable;
use crate::queue::{InputHandoffQueue, ScheduledInput};
use crate::ring::ScheduledInputRing;
use crate::transport::{Delivery, PeerId, Transport, TransportEvent};

/// Server runtime parameters.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub sim_rate_hz: u32,
    pub net_rate_hz: u32,
    /// Client capacity; also the ack-table size.
    pub max_clients: usize,
    /// Ticks between receiving an input and applying it, masking network
    /// jitter at the cost of latency.
    pub input_delay_ticks: u64,
    /// Scheduling ring size. Size it well above the input delay plus the
    /// worst-case input burst.
    pub ring_capacity: usize,
    /// Transport poll timeout on the network thread.
    pub poll_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            sim_rate_hz: 60,
            net_rate_hz: 20,
            max_clients: MAX_CLIENTS,
            input_delay_ticks: 1,
            ring_capacity: 256,
            poll_timeout: Duration::from_millis(1),
        }
    }
}

/// Gameplay seam. The runtime owns scheduling and acknowledgement; what an
/// input *does* is the host's business. Both hooks run on the simulation
/// thread with the fixed dt.
pub trait GameHooks: Send {
    /// An input scheduled for `tick` is due.
    fn apply_input(&mut self, tick: u64, input: &ClientInput, dt: f64);

    /// Advances the world one fixed step, after this tick's inputs.
    fn step(&mut self, tick: u64, dt: f64) {
        let _ = (tick, dt);
    }
}

/// Hooks that just log applied inputs, for running the server without a
/// game attached.
#[derive(Debug, Default)]
pub struct LoggingHooks;

impl GameHooks for LoggingHooks {
    fn apply_input(&mut self, tick: u64, input: &ClientInput, _dt: f64) {
        debug!(
            "[sim tick={}] apply input: client={} clientTick={} seq={} buttons={} ax={:.2} ay={:.2}",
            tick,
            input.client_id,
            input.client_tick,
            input.sequence,
            input.buttons,
            input.axis_x,
            input.axis_y
        );
    }
}

/// State shared between the network and simulation roles.
#[derive(Debug)]
struct Pipeline {
    acks: AckTable,
    queue: InputHandoffQueue,
    /// Mirror of the engine's simulation tick, published each tick for the
    /// network role's target-tick stamping. A stale read only shifts an
    /// input within the input-delay slack, so relaxed ordering suffices.
    sim_tick: AtomicU64,
    input_delay_ticks: u64,
}

impl Pipeline {
    fn new(config: &ServerConfig) -> Self {
        Self {
            acks: AckTable::new(config.max_clients),
            queue: InputHandoffQueue::new(),
            sim_tick: AtomicU64::new(0),
            input_delay_ticks: config.input_delay_ticks,
        }
    }

    /// Network-role half: decode, validate, acknowledge, stamp, hand off.
    fn ingest(&self, codec: &dyn Codec, peer: PeerId, payload: &[u8]) {
        let message = match codec.decode_input(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("dropping payload from client {}: {}", peer, e);
                return;
            }
        };
        let input = message.into_client_input(peer);
        if !self.acks.record_received(input.client_id, input.sequence) {
            warn!(
                "dropping input with out-of-range client id {}",
                input.client_id
            );
            return;
        }
        let target_tick = self.sim_tick.load(Ordering::Relaxed) + self.input_delay_ticks;
        self.queue.push(ScheduledInput { target_tick, input });
    }

    /// Simulation-role half: advance the tick, re-bucket the handoff batch,
    /// apply everything due this tick.
    fn run_simulation_tick(
        &self,
        ring: &mut ScheduledInputRing,
        game: &mut dyn GameHooks,
        dt: f64,
    ) -> u64 {
        let tick = self.sim_tick.fetch_add(1, Ordering::Relaxed) + 1;

        for queued in self.queue.drain_all() {
            ring.file_input(queued.target_tick, queued.input);
        }

        for input in ring.take_inputs_for(tick) {
            game.apply_input(tick, &input, dt);
            // Last write wins under reordering; see AckTable for the
            // monotonic-only alternative.
            self.acks.record_applied(input.client_id, input.sequence);
        }

        game.step(tick, dt);
        tick
    }

    /// Engine-thread network tick: one status unicast per connected peer,
    /// because acknowledgement state differs per client.
    fn run_network_tick(&self, transport: &mut dyn Transport, codec: &dyn Codec) {
        let server_tick = self.sim_tick.load(Ordering::Relaxed);
        for peer in transport.connected_peers() {
            let acks = match self.acks.snapshot(peer) {
                Some(acks) => acks,
                None => continue,
            };
            let status = StatusPayload {
                server_tick,
                ack_applied: acks.last_applied,
                ack_received: acks.last_received,
            };
            match codec.encode_status(&status) {
                Ok(payload) => {
                    if let Err(e) = transport.send(peer, &payload, Delivery::Unreliable) {
                        warn!("status send to client {} failed: {}", peer, e);
                    }
                }
                Err(e) => warn!("status for client {} could not be encoded: {}", peer, e),
            }
        }
        if let Err(e) = transport.flush() {
            warn!("transport flush failed: {}", e);
        }
    }
}

fn network_role<T: Transport>(
    mut transport: T,
    codec: Arc<dyn Codec>,
    pipeline: Arc<Pipeline>,
    stop: Arc<AtomicBool>,
    poll_timeout: Duration,
) {
    let mut events = Vec::new();
    while !stop.load(Ordering::Relaxed) {
        events.clear();
        if let Err(e) = transport.poll(poll_timeout, &mut events) {
            error!("transport poll failed: {}", e);
            thread::sleep(Duration::from_millis(10));
            continue;
        }
        for event in events.drain(..) {
            match event {
                TransportEvent::Connected(peer) => {
                    info!("client {} connected", peer);
                }
                TransportEvent::Disconnected(peer) => {
                    // The slot (and with it the id) can be handed to a new
                    // client; counters must not carry over.
                    pipeline.acks.reset_client(peer);
                    info!("client {} disconnected", peer);
                }
                TransportEvent::Received { peer, payload } => {
                    pipeline.ingest(codec.as_ref(), peer, &payload);
                }
            }
        }
    }
}

/// One server instance owning the four core pieces: tick engine, ack table,
/// handoff queue and scheduling ring. Construct as many instances as
/// needed; nothing here is global.
pub struct ServerEngine {
    config: ServerConfig,
    engine: TickEngine,
    pipeline: Arc<Pipeline>,
}

impl ServerEngine {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_engine_config(config, EngineConfig::default())
    }

    pub fn with_engine_config(config: ServerConfig, engine_config: EngineConfig) -> Self {
        let pipeline = Arc::new(Pipeline::new(&config));
        Self {
            config,
            engine: TickEngine::new(engine_config),
            pipeline,
        }
    }

    /// Handle for stopping the run from another thread: a signal handler,
    /// an admin surface, a test.
    pub fn stop_handle(&self) -> StopHandle {
        self.engine.stop_handle()
    }

    /// Runs until stopped. `poll_transport` is consumed by the network
    /// thread; `broadcast_transport` must be a second handle over the same
    /// endpoint and stays on the engine thread for status broadcasts.
    pub fn run<T: Transport + 'static>(
        &mut self,
        poll_transport: T,
        broadcast_transport: T,
        codec: Arc<dyn Codec>,
        game: &mut dyn GameHooks,
    ) -> Result<(), EngineError> {
        let mut session = Session {
            pipeline: Arc::clone(&self.pipeline),
            ring: ScheduledInputRing::new(self.config.ring_capacity),
            codec,
            game,
            broadcast: broadcast_transport,
            poll: Some(poll_transport),
            poll_timeout: self.config.poll_timeout,
            net_stop: Arc::new(AtomicBool::new(false)),
            net_thread: None,
        };
        self.engine
            .run(self.config.sim_rate_hz, self.config.net_rate_hz, &mut session)
    }
}

/// Engine callbacks for one run. Spawns the network role at load and joins
/// it at unload, before any shared state is released.
struct Session<'g, T: Transport> {
    pipeline: Arc<Pipeline>,
    ring: ScheduledInputRing,
    codec: Arc<dyn Codec>,
    game: &'g mut dyn GameHooks,
    broadcast: T,
    poll: Option<T>,
    poll_timeout: Duration,
    net_stop: Arc<AtomicBool>,
    net_thread: Option<JoinHandle<()>>,
}

impl<T: Transport + 'static> EngineCallbacks for Session<'_, T> {
    fn on_load(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let transport = self.poll.take().ok_or("network role already started")?;
        let codec = Arc::clone(&self.codec);
        let pipeline = Arc::clone(&self.pipeline);
        let stop = Arc::clone(&self.net_stop);
        let poll_timeout = self.poll_timeout;
        let handle = thread::Builder::new()
            .name("net-ingest".into())
            .spawn(move || network_role(transport, codec, pipeline, stop, poll_timeout))?;
        self.net_thread = Some(handle);
        Ok(())
    }

    fn on_unload(&mut self) {
        self.net_stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.net_thread.take() {
            if handle.join().is_err() {
                error!("network thread panicked during shutdown");
            }
        }
        self.pipeline.acks.reset();
        info!("server session unloaded");
    }

    fn on_simulation_tick(&mut self, dt: f64) {
        self.pipeline
            .run_simulation_tick(&mut self.ring, &mut *self.game, dt);
    }

    fn on_network_tick(&mut self) {
        self.pipeline
            .run_network_tick(&mut self.broadcast, self.codec.as_ref());
    }
}
