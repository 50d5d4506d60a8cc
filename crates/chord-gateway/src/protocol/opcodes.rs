//! Gateway operation codes

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Which side of the connection may send an op code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
    Both,
}

/// The `op` field of every gateway frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Dispatch = 0,
    Heartbeat = 1,
    Identify = 2,
    PresenceUpdate = 3,
    Resume = 6,
    /// The gateway asks the client to reconnect and resume
    Reconnect = 7,
    RequestGuildMembers = 8,
    /// `d` tells whether the session may be resumed
    InvalidSession = 9,
    /// First frame on a new connection, carries the heartbeat interval
    Hello = 10,
    HeartbeatAck = 11,
}

impl OpCode {
    const ALL: [Self; 10] = [
        Self::Dispatch,
        Self::Heartbeat,
        Self::Identify,
        Self::PresenceUpdate,
        Self::Resume,
        Self::Reconnect,
        Self::RequestGuildMembers,
        Self::InvalidSession,
        Self::Hello,
        Self::HeartbeatAck,
    ];

    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| *op as u8 == value)
    }

    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Heartbeat => Direction::Both,
            Self::Identify | Self::PresenceUpdate | Self::Resume | Self::RequestGuildMembers => Direction::Send,
            Self::Dispatch | Self::Reconnect | Self::InvalidSession | Self::Hello | Self::HeartbeatAck => {
                Direction::Receive
            }
        }
    }

    /// Whether the gateway may send this op code to a client
    #[must_use]
    pub const fn sent_by_gateway(self) -> bool {
        !matches!(self.direction(), Direction::Send)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "DISPATCH",
            Self::Heartbeat => "HEARTBEAT",
            Self::Identify => "IDENTIFY",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::Resume => "RESUME",
            Self::Reconnect => "RECONNECT",
            Self::RequestGuildMembers => "REQUEST_GUILD_MEMBERS",
            Self::InvalidSession => "INVALID_SESSION",
            Self::Hello => "HELLO",
            Self::HeartbeatAck => "HEARTBEAT_ACK",
        }
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Self::from_u8(raw).ok_or_else(|| serde::de::Error::custom(format!("unknown opcode {raw}")))
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", *self as u8, self.name())
    }
}
