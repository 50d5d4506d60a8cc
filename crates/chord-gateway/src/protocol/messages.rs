//! Gateway message format
//!
//! Every frame is a JSON text `{"op": int, "d": any, "s": int|null, "t": string|null}`.

use super::{
    HelloPayload, IdentifyPayload, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload,
    ResumePayload,
};
use chord_common::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One gateway frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event data payload
    pub d: Value,

    /// Sequence number (dispatch only)
    pub s: Option<u64>,

    /// Event name (dispatch only)
    pub t: Option<String>,
}

/// Wire shape before the opcode is checked
#[derive(Deserialize)]
struct RawFrame {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

impl GatewayMessage {
    fn command(op: OpCode, d: Value) -> Self {
        Self { op, d, s: None, t: None }
    }

    fn command_with<T: Serialize>(op: OpCode, payload: &T) -> ClientResult<Self> {
        serde_json::to_value(payload)
            .map(|d| Self::command(op, d))
            .map_err(|e| ClientError::protocol(format!("unserializable {} payload: {e}", op.name())))
    }

    // === Client commands ===

    /// Heartbeat carrying the last sequence number seen, `null` before any
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::command(OpCode::Heartbeat, last_sequence.map_or(Value::Null, Value::from))
    }

    pub fn identify(payload: &IdentifyPayload) -> ClientResult<Self> {
        Self::command_with(OpCode::Identify, payload)
    }

    pub fn resume(payload: &ResumePayload) -> ClientResult<Self> {
        Self::command_with(OpCode::Resume, payload)
    }

    pub fn presence_update(payload: &PresenceUpdatePayload) -> ClientResult<Self> {
        Self::command_with(OpCode::PresenceUpdate, payload)
    }

    pub fn request_guild_members(payload: &RequestGuildMembersPayload) -> ClientResult<Self> {
        Self::command_with(OpCode::RequestGuildMembers, payload)
    }

    // === Server messages ===

    /// Create a Dispatch message (op=0)
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: data,
            s: Some(sequence),
            t: Some(event_type.into()),
        }
    }

    /// Create a Hello message (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::command(
            OpCode::Hello,
            serde_json::json!({ "heartbeat_interval": heartbeat_interval }),
        )
    }

    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::command(OpCode::HeartbeatAck, Value::Null)
    }

    #[must_use]
    pub fn reconnect() -> Self {
        Self::command(OpCode::Reconnect, Value::Null)
    }

    /// `resumable` indicates if the session can be resumed
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::command(OpCode::InvalidSession, Value::Bool(resumable))
    }

    // === Parsing ===

    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    pub fn as_identify(&self) -> Option<IdentifyPayload> {
        if self.op != OpCode::Identify {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    pub fn as_resume(&self) -> Option<ResumePayload> {
        if self.op != OpCode::Resume {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    /// Whether an invalid-session frame allows resuming
    pub fn as_invalid_session(&self) -> Option<bool> {
        if self.op != OpCode::InvalidSession {
            return None;
        }
        Some(self.d.as_bool().unwrap_or(false))
    }

    /// Try to parse the heartbeat sequence number (op=1)
    pub fn as_heartbeat_seq(&self) -> Option<Option<u64>> {
        if self.op != OpCode::Heartbeat {
            return None;
        }
        Some(self.d.as_u64())
    }

    // === Codec ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> ClientResult<String> {
        serde_json::to_string(self).map_err(|e| ClientError::protocol(format!("unserializable frame: {e}")))
    }

    /// Decode a frame
    ///
    /// Fails with a protocol violation for undecodable JSON, an unknown opcode
    /// or a dispatch without an event name.
    pub fn from_json(json: &str) -> ClientResult<Self> {
        let raw: RawFrame =
            serde_json::from_str(json).map_err(|e| ClientError::protocol(format!("undecodable frame: {e}")))?;
        let op = OpCode::from_u8(raw.op).ok_or_else(|| ClientError::protocol(format!("unknown opcode {}", raw.op)))?;

        if op == OpCode::Dispatch && raw.t.as_deref().map_or(true, str::is_empty) {
            return Err(ClientError::protocol("dispatch without event name"));
        }

        Ok(Self {
            op,
            d: raw.d,
            s: raw.s,
            t: raw.t,
        })
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_common::ErrorKind;
    use chord_core::{Intents, ShardInfo};
    use serde_json::json;

    #[test]
    fn test_heartbeat_carries_sequence_or_null() {
        let json = GatewayMessage::heartbeat(None).to_json().unwrap();
        assert_eq!(json, r#"{"op":1,"d":null,"s":null,"t":null}"#);

        let json = GatewayMessage::heartbeat(Some(42)).to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["d"], 42);
    }

    #[test]
    fn test_identify_survives_the_wire() {
        let payload = IdentifyPayload {
            token: "secret".to_string(),
            properties: crate::protocol::IdentifyProperties::current(),
            compress: false,
            large_threshold: 250,
            shard: ShardInfo::new(0, 1).unwrap(),
            presence: Some(PresenceUpdatePayload::new("idle")),
            intents: Intents::NON_PRIVILEGED,
        };

        let frame = GatewayMessage::identify(&payload).unwrap();
        let decoded = GatewayMessage::from_json(&frame.to_json().unwrap()).unwrap();
        assert_eq!(decoded.as_identify(), Some(payload));
    }

    #[test]
    fn test_resume_survives_the_wire() {
        let payload = ResumePayload {
            token: "secret".to_string(),
            session_id: "abc".to_string(),
            seq: 1337,
        };
        let frame = GatewayMessage::resume(&payload).unwrap();
        let decoded = GatewayMessage::from_json(&frame.to_json().unwrap()).unwrap();
        assert_eq!(decoded.op, OpCode::Resume);
        assert_eq!(decoded.as_resume(), Some(payload));
    }

    #[test]
    fn test_decode_dispatch() {
        let msg = GatewayMessage::from_json(r#"{"op":0,"d":{"id":"1"},"s":5,"t":"MESSAGE_CREATE"}"#).unwrap();
        assert_eq!(msg.op, OpCode::Dispatch);
        assert_eq!(msg.s, Some(5));
        assert_eq!(msg.t.as_deref(), Some("MESSAGE_CREATE"));
        assert_eq!(msg.d["id"], "1");
    }

    #[test]
    fn test_decode_hello() {
        let msg = GatewayMessage::from_json(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#).unwrap();
        assert_eq!(msg.as_hello(), Some(HelloPayload::with_interval(41_250)));
        assert_eq!(msg.s, None);
    }

    #[test]
    fn test_protocol_violations() {
        for frame in [
            "not json",
            r#"{"op":42,"d":null}"#,
            r#"{"op":0,"d":{},"s":1,"t":null}"#,
            r#"{"op":0,"d":{},"s":1,"t":""}"#,
            r#"{"d":null}"#,
        ] {
            let err = GatewayMessage::from_json(frame).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ProtocolViolation, "frame {frame}");
        }
    }

    #[test]
    fn test_invalid_session_flag() {
        assert_eq!(GatewayMessage::invalid_session(true).as_invalid_session(), Some(true));
        let msg = GatewayMessage::from_json(r#"{"op":9,"d":false}"#).unwrap();
        assert_eq!(msg.as_invalid_session(), Some(false));
        assert_eq!(GatewayMessage::heartbeat_ack().as_invalid_session(), None);
    }

    #[test]
    fn test_server_heartbeat_request() {
        let msg = GatewayMessage::from_json(r#"{"op":1,"d":null}"#).unwrap();
        assert_eq!(msg.as_heartbeat_seq(), Some(None));
    }

    #[test]
    fn test_message_display() {
        let dispatch = GatewayMessage::dispatch("GUILD_CREATE", 5, json!({}));
        let display = dispatch.to_string();
        assert!(display.contains("GUILD_CREATE"));
        assert!(display.contains("s=5"));
        assert_eq!(GatewayMessage::hello(1000).to_string(), "GatewayMessage(op=10/HELLO)");
    }
}
