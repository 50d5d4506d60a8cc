//! Sharding
//!
//! One runner per shard, a shared identify queue, and the manager that owns them.

mod identify_queue;
mod manager;
mod runner;

pub use identify_queue::IdentifyQueue;
pub use manager::{ShardManager, ShardManagerConfig};
pub use runner::{RunnerOptions, ShardHandle, ShardRunner};
