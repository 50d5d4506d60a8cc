//! Payload definitions
//!
//! `d` payloads of the handshake and of client commands.

use chord_core::{Intents, ShardInfo, Snowflake};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    /// Interval the service currently announces
    pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 41_250;

    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

impl Default for HelloPayload {
    fn default() -> Self {
        Self::with_interval(Self::DEFAULT_HEARTBEAT_INTERVAL)
    }
}

/// Payload for op 2 (Identify)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: IdentifyProperties,
    #[serde(default)]
    pub compress: bool,
    /// Member count above which offline members are not sent
    pub large_threshold: u8,
    pub shard: ShardInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceUpdatePayload>,
    pub intents: Intents,
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl IdentifyProperties {
    /// Properties describing this library on the current platform
    #[must_use]
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "chord".to_string(),
            device: "chord".to_string(),
        }
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::current()
    }
}

/// Payload for op 3 (Presence Update)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdatePayload {
    /// Unix time in milliseconds the client went idle
    pub since: Option<u64>,
    #[serde(default)]
    pub activities: Vec<Value>,
    /// online, idle, dnd, invisible or offline
    pub status: String,
    #[serde(default)]
    pub afk: bool,
}

impl PresenceUpdatePayload {
    /// Valid status values
    pub const VALID_STATUSES: &'static [&'static str] = &["online", "idle", "dnd", "invisible", "offline"];

    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            since: None,
            activities: Vec::new(),
            status: status.into(),
            afk: false,
        }
    }

    #[must_use]
    pub fn with_activity(mut self, activity: Value) -> Self {
        self.activities.push(activity);
        self
    }

    /// Check if the status is valid
    #[must_use]
    pub fn is_valid_status(&self) -> bool {
        Self::VALID_STATUSES.contains(&self.status.as_str())
    }
}

/// Payload for op 6 (Resume)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    /// Last sequence number received
    pub seq: u64,
}

/// Payload for op 8 (Request Guild Members)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub limit: u32,
    #[serde(default)]
    pub presences: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<Snowflake>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl RequestGuildMembersPayload {
    /// Members whose username starts with `query`; an empty query with limit 0
    /// requests every member
    #[must_use]
    pub fn by_query(guild_id: Snowflake, query: impl Into<String>, limit: u32) -> Self {
        Self {
            guild_id,
            query: Some(query.into()),
            limit,
            presences: false,
            user_ids: None,
            nonce: None,
        }
    }

    #[must_use]
    pub fn by_ids(guild_id: Snowflake, user_ids: Vec<Snowflake>) -> Self {
        Self {
            guild_id,
            query: None,
            limit: 0,
            presences: false,
            user_ids: Some(user_ids),
            nonce: None,
        }
    }
}

/// `d` of the READY dispatch; only the fields the session needs are typed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyPayload {
    #[serde(default)]
    pub v: u8,
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    #[serde(default)]
    pub shard: Option<ShardInfo>,
    #[serde(default)]
    pub user: Value,
    #[serde(default)]
    pub guilds: Vec<Value>,
}
