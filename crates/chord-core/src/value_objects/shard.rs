//! Shard assignment
//!
//! A shard is one partition of the application's gateway workload. The pair
//! `[id, count]` is sent in Identify and fixed for the life of the session.

use crate::error::CoreError;
use crate::value_objects::Snowflake;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable shard id and shard count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 2]", into = "[u32; 2]")]
pub struct ShardInfo {
    id: u32,
    count: u32,
}

impl ShardInfo {
    /// Create a shard assignment; `id` must be below `count`.
    pub fn new(id: u32, count: u32) -> Result<Self, CoreError> {
        if count == 0 || id >= count {
            return Err(CoreError::InvalidShard { id, count });
        }
        Ok(Self { id, count })
    }

    /// The single shard of an unsharded application
    pub const ONE: Self = Self { id: 0, count: 1 };

    #[inline]
    pub const fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Deterministic partition function: `routing_key mod shard_count`
    #[inline]
    pub const fn shard_for(routing_key: u64, count: u32) -> u32 {
        (routing_key % count as u64) as u32
    }

    /// Whether this shard owns traffic for the routing key
    #[inline]
    pub const fn owns(&self, routing_key: u64) -> bool {
        Self::shard_for(routing_key, self.count) == self.id
    }

    /// Whether this shard receives events for the guild
    #[inline]
    pub const fn owns_guild(&self, guild_id: Snowflake) -> bool {
        self.owns(guild_id.routing_key())
    }

    /// Identify rate-limit bucket for this shard under the given concurrency
    #[inline]
    pub const fn identify_bucket(&self, max_concurrency: u32) -> u32 {
        if max_concurrency == 0 {
            return self.id;
        }
        self.id % max_concurrency
    }
}

impl TryFrom<[u32; 2]> for ShardInfo {
    type Error = CoreError;

    fn try_from(value: [u32; 2]) -> Result<Self, Self::Error> {
        Self::new(value[0], value[1])
    }
}

impl From<ShardInfo> for [u32; 2] {
    fn from(shard: ShardInfo) -> Self {
        [shard.id, shard.count]
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.id, self.count)
    }
}
