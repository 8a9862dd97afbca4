//! End-to-end tests: a real server engine over loopback UDP sockets.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use engine::{EngineError, StopHandle};
use server::session::{LoggingHooks, ServerConfig, ServerEngine};
use server::udp::UdpTransport;
use shared::{Codec, InputMessage, JsonCodec, StatusPayload};

struct RunningServer {
    addr: SocketAddr,
    stop: StopHandle,
    handle: JoinHandle<Result<(), EngineError>>,
}

impl RunningServer {
    fn start(config: ServerConfig) -> Self {
        let transport = UdpTransport::bind("127.0.0.1:0", config.max_clients, Duration::from_secs(5))
            .expect("bind transport");
        let addr = transport.local_addr().expect("transport addr");
        let broadcast = transport.try_clone().expect("clone transport");

        let mut engine = ServerEngine::new(config);
        let stop = engine.stop_handle();
        let handle = thread::spawn(move || {
            engine.run(transport, broadcast, Arc::new(JsonCodec), &mut LoggingHooks)
        });

        Self { addr, stop, handle }
    }

    fn shutdown(self) {
        self.stop.request_stop();
        self.handle
            .join()
            .expect("server thread")
            .expect("engine result");
    }
}

fn fast_config() -> ServerConfig {
    ServerConfig {
        sim_rate_hz: 120,
        net_rate_hz: 60,
        ..ServerConfig::default()
    }
}

fn bind_client(server: SocketAddr) -> UdpSocket {
    let client = UdpSocket::bind("127.0.0.1:0").expect("bind client");
    client.connect(server).expect("connect client");
    client
        .set_read_timeout(Some(Duration::from_millis(100)))
        .expect("client timeout");
    client
}

/// Sends `message` until a status satisfying `accept` comes back or the
/// deadline passes. Resending is fine: the wire is unreliable by design and
/// re-delivery of the same sequence is idempotent on the counters.
fn send_until<F>(client: &UdpSocket, message: &InputMessage, accept: F) -> Option<StatusPayload>
where
    F: Fn(&StatusPayload) -> bool,
{
    let payload = JsonCodec.encode_input(message).expect("encode input");
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut buf = [0u8; 2048];

    while Instant::now() < deadline {
        client.send(&payload).expect("send input");
        if let Ok((len, _)) = client.recv_from(&mut buf) {
            if let Ok(status) = JsonCodec.decode_status(&buf[..len]) {
                if accept(&status) {
                    return Some(status);
                }
            }
        }
    }
    None
}

#[test]
fn input_is_acknowledged_end_to_end() {
    let server = RunningServer::start(fast_config());
    let client = bind_client(server.addr);

    let message = InputMessage {
        client_tick: 1,
        seq: 1,
        buttons: 1,
        ax: 0.25,
        ay: -0.10,
    };
    let status = send_until(&client, &message, |status| {
        status.ack_applied == 1 && status.ack_received == 1
    });

    server.shutdown();

    let status = status.expect("server acknowledged the input");
    assert!(status.server_tick >= 1);
}

#[test]
fn malformed_payloads_are_ignored_and_the_server_keeps_running() {
    let server = RunningServer::start(fast_config());
    let client = bind_client(server.addr);

    // Garbage first: not JSON, then JSON missing the required seq field.
    // Neither may count as received input.
    client.send(b"definitely not json").expect("send garbage");
    client
        .send(br#"{"clientTick":9}"#)
        .expect("send incomplete");

    let message = InputMessage {
        client_tick: 2,
        seq: 2,
        buttons: 0,
        ax: 0.0,
        ay: 0.0,
    };
    let status = send_until(&client, &message, |status| {
        status.ack_received == 2 && status.ack_applied == 2
    });

    server.shutdown();

    let status = status.expect("server survived the garbage");
    assert_eq!(status.ack_received, 2);
    assert_eq!(status.ack_applied, 2);
}

#[test]
fn statuses_are_per_client() {
    let server = RunningServer::start(fast_config());
    let first = bind_client(server.addr);
    let second = bind_client(server.addr);

    let first_status = send_until(
        &first,
        &InputMessage {
            client_tick: 1,
            seq: 10,
            buttons: 0,
            ax: 0.0,
            ay: 0.0,
        },
        |status| status.ack_received == 10,
    );
    let second_status = send_until(
        &second,
        &InputMessage {
            client_tick: 1,
            seq: 20,
            buttons: 0,
            ax: 0.0,
            ay: 0.0,
        },
        |status| status.ack_received == 20,
    );

    server.shutdown();

    assert!(first_status.is_some());
    assert!(second_status.is_some());
}

#[test]
fn idle_server_stops_cleanly() {
    let server = RunningServer::start(ServerConfig::default());
    thread::sleep(Duration::from_millis(100));
    server.shutdown();
}

#[test]
fn stop_is_idempotent_across_threads() {
    let server = RunningServer::start(ServerConfig::default());

    let stop = server.stop.clone();
    let other = thread::spawn(move || stop.request_stop());
    other.join().expect("stopper thread");

    // A second request is a no-op; the run still returns exactly once.
    server.shutdown();
}
