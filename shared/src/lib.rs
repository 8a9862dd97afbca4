//! Wire types and payload codec shared by the server and its clients.
//!
//! The wire schema is deliberately small: clients send one input message per
//! client tick, the server answers with a per-client acknowledgement status
//! at its network rate. Everything else (snapshots, deltas, game state) is
//! the host application's business.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on concurrently connected clients. Transport-assigned client
/// ids must stay below this so they can index per-client tables directly.
pub const MAX_CLIENTS: usize = 64;

/// One client input as it appears on the wire.
///
/// `clientTick` and `seq` are required; a payload missing either is
/// malformed. The remaining fields default to zero so clients may omit them
/// on idle frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    /// Client-local tick the sample was taken at. Informational.
    #[serde(rename = "clientTick")]
    pub client_tick: u32,
    /// Monotonically increasing per-client input counter.
    pub seq: u32,
    #[serde(default)]
    pub buttons: u32,
    #[serde(default)]
    pub ax: f32,
    #[serde(default)]
    pub ay: f32,
}

/// Acknowledgement status the server unicasts to each connected peer at its
/// network tick rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(rename = "serverTick")]
    pub server_tick: u64,
    /// Last input sequence the simulation applied for this client.
    #[serde(rename = "ackApplied")]
    pub ack_applied: u32,
    /// Last input sequence the network role received from this client.
    #[serde(rename = "ackRecv")]
    pub ack_received: u32,
}

/// A decoded input stamped with the transport-assigned client identity,
/// ready for the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientInput {
    pub client_id: u32,
    pub client_tick: u32,
    pub sequence: u32,
    pub buttons: u32,
    pub axis_x: f32,
    pub axis_y: f32,
}

impl InputMessage {
    /// Stamps the transport-assigned `client_id` onto a decoded message and
    /// sanitizes the analog axes.
    pub fn into_client_input(self, client_id: u32) -> ClientInput {
        ClientInput {
            client_id,
            client_tick: self.client_tick,
            sequence: self.seq,
            buttons: self.buttons,
            axis_x: clamp_axis(self.ax),
            axis_y: clamp_axis(self.ay),
        }
    }
}

// Axes come straight off the wire; out-of-range or non-finite values are
// brought back into [-1, 1].
fn clamp_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    Malformed(Box<dyn std::error::Error + Send + Sync>),
    #[error("payload could not be encoded: {0}")]
    Encode(Box<dyn std::error::Error + Send + Sync>),
}

/// Payload codec seam. The server runtime only ever sees these four
/// operations; the concrete format behind them is interchangeable.
pub trait Codec: Send + Sync {
    fn decode_input(&self, payload: &[u8]) -> Result<InputMessage, CodecError>;
    fn encode_input(&self, message: &InputMessage) -> Result<Vec<u8>, CodecError>;
    fn decode_status(&self, payload: &[u8]) -> Result<StatusPayload, CodecError>;
    fn encode_status(&self, status: &StatusPayload) -> Result<Vec<u8>, CodecError>;
}

/// JSON codec over the schema above, e.g.
/// `{"clientTick":1,"seq":1,"buttons":1,"ax":0.25,"ay":-0.1}` in and
/// `{"serverTick":11,"ackApplied":1,"ackRecv":1}` out.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode_input(&self, payload: &[u8]) -> Result<InputMessage, CodecError> {
        serde_json::from_slice(payload).map_err(|e| CodecError::Malformed(e.into()))
    }

    fn encode_input(&self, message: &InputMessage) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(message).map_err(|e| CodecError::Encode(e.into()))
    }

    fn decode_status(&self, payload: &[u8]) -> Result<StatusPayload, CodecError> {
        serde_json::from_slice(payload).map_err(|e| CodecError::Malformed(e.into()))
    }

    fn encode_status(&self, status: &StatusPayload) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(status).map_err(|e| CodecError::Encode(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn decode_full_input_message() {
        let payload = br#"{"clientTick":7,"seq":42,"buttons":3,"ax":0.25,"ay":-0.1}"#;
        let message = JsonCodec.decode_input(payload).unwrap();

        assert_eq!(message.client_tick, 7);
        assert_eq!(message.seq, 42);
        assert_eq!(message.buttons, 3);
        assert_approx_eq!(message.ax, 0.25, 1e-6);
        assert_approx_eq!(message.ay, -0.1, 1e-6);
    }

    #[test]
    fn optional_fields_default_to_zero() {
        let payload = br#"{"clientTick":1,"seq":1}"#;
        let message = JsonCodec.decode_input(payload).unwrap();

        assert_eq!(message.buttons, 0);
        assert_eq!(message.ax, 0.0);
        assert_eq!(message.ay, 0.0);
    }

    #[test]
    fn missing_seq_is_malformed() {
        let payload = br#"{"clientTick":1,"buttons":1}"#;
        assert!(JsonCodec.decode_input(payload).is_err());
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(JsonCodec.decode_input(b"not json at all").is_err());
        assert!(JsonCodec.decode_input(b"").is_err());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let payload = br#"{"clientTick":1,"seq":2,"extra":"field"}"#;
        let message = JsonCodec.decode_input(payload).unwrap();
        assert_eq!(message.seq, 2);
    }

    #[test]
    fn axes_are_clamped_on_conversion() {
        let message = InputMessage {
            client_tick: 1,
            seq: 1,
            buttons: 0,
            ax: 2.5,
            ay: -7.0,
        };
        let input = message.into_client_input(3);

        assert_eq!(input.client_id, 3);
        assert_eq!(input.axis_x, 1.0);
        assert_eq!(input.axis_y, -1.0);
    }

    #[test]
    fn non_finite_axes_become_zero() {
        let message = InputMessage {
            client_tick: 1,
            seq: 1,
            buttons: 0,
            ax: f32::NAN,
            ay: f32::INFINITY,
        };
        let input = message.into_client_input(0);

        assert_eq!(input.axis_x, 0.0);
        assert_eq!(input.axis_y, 0.0);
    }

    #[test]
    fn status_payload_uses_wire_field_names() {
        let status = StatusPayload {
            server_tick: 11,
            ack_applied: 1,
            ack_received: 1,
        };
        let payload = JsonCodec.encode_status(&status).unwrap();

        assert_eq!(
            payload,
            br#"{"serverTick":11,"ackApplied":1,"ackRecv":1}"#.to_vec()
        );
    }

    #[test]
    fn status_roundtrip() {
        let status = StatusPayload {
            server_tick: u64::MAX,
            ack_applied: 17,
            ack_received: 19,
        };
        let payload = JsonCodec.encode_status(&status).unwrap();
        let decoded = JsonCodec.decode_status(&payload).unwrap();

        assert_eq!(decoded, status);
    }
}
