use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use server::session::{LoggingHooks, ServerConfig, ServerEngine};
use server::udp::UdpTransport;
use shared::JsonCodec;

/// Authoritative game server: dual-rate tick engine over UDP.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind the UDP socket to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// UDP port to listen on
    #[clap(short, long, default_value = "7777")]
    port: u16,
    /// Simulation tick rate (Hz)
    #[clap(long, default_value = "60")]
    sim_rate: u32,
    /// Network tick rate (Hz)
    #[clap(long, default_value = "20")]
    net_rate: u32,
    /// Maximum concurrent clients
    #[clap(long, default_value = "64")]
    max_clients: usize,
    /// Input delay in simulation ticks
    #[clap(long, default_value = "1")]
    input_delay: u64,
    /// Seconds of silence before a client is dropped
    #[clap(long, default_value = "5")]
    idle_timeout: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = ServerConfig {
        sim_rate_hz: args.sim_rate,
        net_rate_hz: args.net_rate,
        max_clients: args.max_clients,
        input_delay_ticks: args.input_delay,
        ..ServerConfig::default()
    };

    let transport = UdpTransport::bind(
        (args.host.as_str(), args.port),
        args.max_clients,
        Duration::from_secs(args.idle_timeout),
    )?;
    let broadcast = transport.try_clone()?;

    let mut engine = ServerEngine::new(config);
    engine.run(transport, broadcast, Arc::new(JsonCodec), &mut LoggingHooks)?;
    Ok(())
}
