//! Gateway events
//!
//! A dispatch frame becomes an [`Event`]: its name, the shard it came from and
//! the untyped `d` payload. Typed views are decoded on demand.

mod event_types;
mod interaction;

pub use event_types::GatewayEventType;
pub use interaction::{Interaction, InteractionData, InteractionKind, InteractionOption};

use chord_common::{ClientError, ClientResult};
use chord_core::Snowflake;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// One dispatched event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub shard_id: u32,
    pub name: String,
    pub seq: Option<u64>,
    pub data: Value,
}

impl Event {
    /// Known event type, if the name is recognized
    #[must_use]
    pub fn kind(&self) -> Option<GatewayEventType> {
        self.name.parse().ok()
    }

    /// Decode the payload
    pub fn parse<T: DeserializeOwned>(&self) -> ClientResult<T> {
        T::deserialize(&self.data).map_err(|e| ClientError::protocol(format!("malformed {} payload: {e}", self.name)))
    }

    pub fn interaction(&self) -> ClientResult<Interaction> {
        if self.kind() != Some(GatewayEventType::InteractionCreate) {
            return Err(ClientError::protocol(format!("{} is not an interaction", self.name)));
        }
        self.parse()
    }

    /// Guild the event belongs to, when the payload names one
    #[must_use]
    pub fn guild_id(&self) -> Option<Snowflake> {
        let raw = match self.kind() {
            Some(GatewayEventType::GuildCreate | GatewayEventType::GuildUpdate | GatewayEventType::GuildDelete) => {
                self.data.get("id")
            }
            _ => self.data.get("guild_id"),
        }?;
        raw.as_str().and_then(|id| Snowflake::parse(id).ok())
    }
}
