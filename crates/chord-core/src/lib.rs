//! # chord-core
//!
//! Value objects shared by the REST and gateway layers: snowflake ids, shard
//! assignments, gateway intents and application command descriptors.
//! This crate performs no I/O.

pub mod commands;
pub mod error;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use commands::{
    ApplicationCommand, AutocompleteChoice, AutocompleteResponse, CommandKind, CommandOption,
    CommandOptionChoice, OptionKind,
};
pub use error::CoreError;
pub use value_objects::{Intents, ShardInfo, Snowflake, SnowflakeParseError};
