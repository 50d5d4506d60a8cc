//! Dispatch event names
//!
//! Names the client recognizes in the `t` field. Unknown names still reach
//! listeners as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEventType {
    // Session
    Ready,
    Resumed,

    // Guilds
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    GuildMembersChunk,

    // Channels
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,

    // Messages
    MessageCreate,
    MessageUpdate,
    MessageDelete,

    // Members and presence
    GuildMemberAdd,
    GuildMemberRemove,
    PresenceUpdate,

    /// Slash command, component, autocomplete or modal
    InteractionCreate,
}

impl GatewayEventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::GuildMemberAdd => "GUILD_MEMBER_ADD",
            Self::GuildMemberRemove => "GUILD_MEMBER_REMOVE",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::InteractionCreate => "INTERACTION_CREATE",
        }
    }

    /// Events that carry the guild in `d.guild_id` (or `d.id` for guild events)
    #[must_use]
    pub const fn is_guild_scoped(self) -> bool {
        !matches!(self, Self::Ready | Self::Resumed)
    }
}

impl FromStr for GatewayEventType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|_| ())
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<GatewayEventType> for String {
    fn from(event: GatewayEventType) -> Self {
        event.as_str().to_string()
    }
}
