//! Value objects - immutable types describing ids, shards and gateway capabilities

mod intents;
mod shard;
mod snowflake;

pub use intents::Intents;
pub use shard::ShardInfo;
pub use snowflake::{Snowflake, SnowflakeParseError};
