use std::net::UdpSocket;
use std::time::Duration;

use shared::{Codec, InputMessage, JsonCodec};

// Headless test client: sends inputs at ~20 Hz for ten seconds and prints
// every acknowledgement status the server sends back.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server_addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7777".to_string());

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_read_timeout(Some(Duration::from_millis(40)))?;
    println!("Client socket bound to {}", socket.local_addr()?);
    println!("Sending inputs to {}", server_addr);

    let codec = JsonCodec;
    let mut buf = [0u8; 2048];

    for seq in 1u32..=200 {
        // Axes sweep a circle so applied inputs are easy to eyeball in the
        // server's debug log.
        let message = InputMessage {
            client_tick: seq,
            seq,
            buttons: u32::from(seq % 4 == 0),
            ax: (seq as f32 / 20.0).sin(),
            ay: (seq as f32 / 20.0).cos(),
        };
        socket.send_to(&codec.encode_input(&message)?, server_addr.as_str())?;

        match socket.recv_from(&mut buf) {
            Ok((len, _)) => match codec.decode_status(&buf[..len]) {
                Ok(status) => println!(
                    "server tick {} ackApplied={} ackRecv={}",
                    status.server_tick, status.ack_applied, status.ack_received
                ),
                Err(e) => println!("unreadable status: {}", e),
            },
            Err(_) => {} // no status this round; statuses come at the net rate
        }

        std::thread::sleep(Duration::from_millis(50));
    }

    println!("Test client finished");
    Ok(())
}
