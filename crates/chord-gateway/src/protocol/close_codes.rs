//! WebSocket close codes
//!
//! Close codes the service sends when it ends a session, and what the client
//! should do about each one.

use chord_common::ClientError;
use serde::{Deserialize, Serialize};

/// Close codes in the gateway's private range (4000-4999)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimeout = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    /// Privileged intents requested but not enabled for the application
    DisallowedIntents = 4014,
}

/// What the session does after the socket closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Reconnect and resume the session
    Resume,
    /// Reconnect with a fresh Identify
    Reidentify,
    /// Stop permanently
    Fatal,
}

impl CloseCode {
    const ALL: [Self; 14] = [
        Self::UnknownError,
        Self::UnknownOpcode,
        Self::DecodeError,
        Self::NotAuthenticated,
        Self::AuthenticationFailed,
        Self::AlreadyAuthenticated,
        Self::InvalidSequence,
        Self::RateLimited,
        Self::SessionTimeout,
        Self::InvalidShard,
        Self::ShardingRequired,
        Self::InvalidApiVersion,
        Self::InvalidIntents,
        Self::DisallowedIntents,
    ];

    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|code| *code as u16 == value)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    #[must_use]
    pub const fn action(self) -> CloseAction {
        match self {
            Self::AuthenticationFailed
            | Self::InvalidShard
            | Self::ShardingRequired
            | Self::InvalidApiVersion
            | Self::InvalidIntents
            | Self::DisallowedIntents => CloseAction::Fatal,
            Self::InvalidSequence | Self::SessionTimeout => CloseAction::Reidentify,
            _ => CloseAction::Resume,
        }
    }

    /// Action for any close code, including the standard WebSocket range
    #[must_use]
    pub fn classify(code: Option<u16>) -> CloseAction {
        code.and_then(Self::from_u16)
            .map_or(CloseAction::Resume, Self::action)
    }

    /// Error surfaced to the owner for a fatal close
    #[must_use]
    pub fn fatal_error(self, shard_id: u32) -> Option<ClientError> {
        match self {
            Self::AuthenticationFailed => Some(ClientError::Authentication(format!(
                "shard {shard_id}: {}",
                self.description()
            ))),
            Self::DisallowedIntents => Some(ClientError::PrivilegedIntentsRequired { shard_id }),
            Self::InvalidShard | Self::ShardingRequired | Self::InvalidApiVersion | Self::InvalidIntents => {
                Some(ClientError::invalid_configuration(format!(
                    "shard {shard_id}: {}",
                    self.description()
                )))
            }
            _ => None,
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "unknown gateway error",
            Self::UnknownOpcode => "gateway received an unknown opcode",
            Self::DecodeError => "gateway could not decode a payload",
            Self::NotAuthenticated => "payload sent before identifying",
            Self::AuthenticationFailed => "authentication failed, the token was rejected",
            Self::AlreadyAuthenticated => "identified more than once",
            Self::InvalidSequence => "resumed with an invalid sequence",
            Self::RateLimited => "commands sent too quickly",
            Self::SessionTimeout => "session timed out",
            Self::InvalidShard => "invalid shard in identify",
            Self::ShardingRequired => "too many guilds for one shard, sharding is required",
            Self::InvalidApiVersion => "invalid or outdated API version",
            Self::InvalidIntents => "invalid intents bitfield",
            Self::DisallowedIntents => "privileged intents not enabled",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
