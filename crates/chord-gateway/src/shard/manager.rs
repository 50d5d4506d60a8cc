//! Shard manager
//!
//! Owns one runner per shard this process is responsible for, routes outbound
//! commands to the right shard and reports per-shard state and latency.
//! Identify is serialized across shards through a shared [`IdentifyQueue`].

use super::{IdentifyQueue, RunnerOptions, ShardHandle, ShardRunner};
use crate::events::Event;
use crate::protocol::{GatewayMessage, PresenceUpdatePayload, RequestGuildMembersPayload};
use crate::session::{Backoff, ConnectionState, IdentifyOptions, SessionStateMachine};
use chord_common::{ClientConfig, ClientError, ClientResult, ReconnectConfig};
use chord_core::{ShardInfo, Snowflake};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Everything needed to build the shards of one process
#[derive(Debug, Clone)]
pub struct ShardManagerConfig {
    /// Gateway base URL
    pub gateway_url: String,
    pub shard_count: u32,
    /// Shards run by this process
    pub shard_ids: Vec<u32>,
    pub max_concurrency: u32,
    pub identify_stagger: Duration,
    pub identify: IdentifyOptions,
    pub runner: RunnerOptions,
    pub reconnect: ReconnectConfig,
}

impl ShardManagerConfig {
    /// Combine client settings with what the service reported
    ///
    /// Explicit shard settings win over `recommended_shards`.
    #[must_use]
    pub fn from_client_config(
        config: &ClientConfig,
        gateway_url: impl Into<String>,
        recommended_shards: u32,
        max_concurrency: u32,
    ) -> Self {
        let gateway = &config.gateway;
        let shard_count = gateway.shard_count.unwrap_or(recommended_shards).max(1);
        let shard_ids = gateway
            .shard_ids
            .clone()
            .unwrap_or_else(|| (0..shard_count).collect());

        let mut identify = IdentifyOptions::new(config.token.clone(), gateway.intents);
        identify.large_threshold = gateway.large_threshold;

        Self {
            gateway_url: gateway_url.into(),
            shard_count,
            shard_ids,
            max_concurrency,
            identify_stagger: gateway.identify_stagger(),
            identify,
            runner: RunnerOptions {
                hello_timeout: gateway.hello_timeout(),
                commands_per_minute: gateway.commands_per_minute,
                api_version: gateway.api_version,
            },
            reconnect: config.reconnect.clone(),
        }
    }
}

pub struct ShardManager {
    shard_count: u32,
    shards: DashMap<u32, ShardHandle>,
    /// Runners waiting for [`ShardManager::run`]
    runners: Mutex<Vec<ShardRunner>>,
}

impl ShardManager {
    /// Build the shards; nothing connects until [`ShardManager::run`]
    pub fn new(config: ShardManagerConfig, events: mpsc::Sender<Event>) -> ClientResult<Self> {
        if config.shard_ids.is_empty() {
            return Err(ClientError::invalid_configuration("no shards to run"));
        }

        let queue = Arc::new(IdentifyQueue::new(config.identify_stagger, config.max_concurrency));
        let shards = DashMap::new();
        let mut runners = Vec::with_capacity(config.shard_ids.len());

        for &id in &config.shard_ids {
            let info = ShardInfo::new(id, config.shard_count)?;
            if shards.contains_key(&id) {
                return Err(ClientError::invalid_configuration(format!("shard {id} listed twice")));
            }
            let machine = SessionStateMachine::new(
                info,
                config.gateway_url.clone(),
                config.identify.clone(),
                Backoff::from_config(&config.reconnect),
            );
            let (runner, handle) = ShardRunner::new(machine, config.runner.clone(), queue.clone(), events.clone());
            shards.insert(id, handle);
            runners.push(runner);
        }

        info!(
            shard_count = config.shard_count,
            local_shards = runners.len(),
            max_concurrency = queue.max_concurrency(),
            "Shard manager created"
        );

        Ok(Self {
            shard_count: config.shard_count,
            shards,
            runners: Mutex::new(runners),
        })
    }

    /// Run every shard until all stop
    ///
    /// The first fatal shard error shuts the remaining shards down and is
    /// returned once they have stopped.
    pub async fn run(&self) -> ClientResult<()> {
        let runners = std::mem::take(&mut *self.runners.lock());
        if runners.is_empty() {
            return Err(ClientError::invalid_configuration("shard manager already started"));
        }

        let mut tasks = JoinSet::new();
        for runner in runners {
            tasks.spawn(runner.run());
        }

        let mut outcome = Ok(());
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(ClientError::connectivity(format!("shard task failed: {e}"))));
            match result {
                Ok(()) => debug!("Shard task finished"),
                Err(e) => {
                    error!(error = %e, "Shard failed");
                    if outcome.is_ok() {
                        self.shutdown();
                        outcome = Err(e);
                    }
                }
            }
        }
        outcome
    }

    /// Ask every shard to close
    pub fn shutdown(&self) {
        for shard in &self.shards {
            shard.shutdown();
        }
    }

    #[must_use]
    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Shards run by this process, ascending
    #[must_use]
    pub fn shard_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.shards.iter().map(|s| *s.key()).collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn shard(&self, id: u32) -> Option<ShardHandle> {
        self.shards.get(&id).map(|s| s.clone())
    }

    /// Shard responsible for `routing_key`
    #[must_use]
    pub fn shard_for(&self, routing_key: u64) -> u32 {
        ShardInfo::shard_for(routing_key, self.shard_count)
    }

    #[must_use]
    pub fn shard_for_guild(&self, guild_id: Snowflake) -> u32 {
        self.shard_for(guild_id.routing_key())
    }

    /// Send `message` on the shard owning `routing_key`
    pub async fn broadcast(&self, routing_key: u64, message: GatewayMessage) -> ClientResult<()> {
        let id = self.shard_for(routing_key);
        let shard = self
            .shard(id)
            .ok_or_else(|| ClientError::invalid_configuration(format!("shard {id} is not run by this process")))?;
        shard.send(message).await
    }

    /// Send `message` on every shard; the first failure is returned after all were tried
    pub async fn send_to_all(&self, message: GatewayMessage) -> ClientResult<()> {
        let shards: Vec<ShardHandle> = self.shards.iter().map(|s| s.clone()).collect();
        let mut outcome = Ok(());
        for shard in shards {
            if let Err(e) = shard.send(message.clone()).await {
                debug!(shard_id = shard.id(), error = %e, "Send to shard failed");
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }
        outcome
    }

    pub async fn update_presence(&self, presence: &PresenceUpdatePayload) -> ClientResult<()> {
        if !presence.is_valid_status() {
            return Err(ClientError::invalid_configuration(format!(
                "unknown presence status {:?}",
                presence.status
            )));
        }
        self.send_to_all(GatewayMessage::presence_update(presence)?).await
    }

    /// Request members on the shard that owns the guild
    pub async fn request_guild_members(&self, request: &RequestGuildMembersPayload) -> ClientResult<()> {
        let message = GatewayMessage::request_guild_members(request)?;
        self.broadcast(request.guild_id.routing_key(), message).await
    }

    #[must_use]
    pub fn states(&self) -> BTreeMap<u32, ConnectionState> {
        self.shards.iter().map(|s| (*s.key(), s.state())).collect()
    }

    #[must_use]
    pub fn latencies(&self) -> BTreeMap<u32, Option<Duration>> {
        self.shards.iter().map(|s| (*s.key(), s.latency())).collect()
    }

    /// Average heartbeat latency over shards that have one
    #[must_use]
    pub fn average_latency(&self) -> Option<Duration> {
        let known: Vec<Duration> = self.shards.iter().filter_map(|s| s.latency()).collect();
        if known.is_empty() {
            return None;
        }
        Some(known.iter().sum::<Duration>() / known.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_common::ErrorKind;
    use chord_core::Intents;

    fn config(count: u32, ids: Vec<u32>) -> ShardManagerConfig {
        ShardManagerConfig {
            gateway_url: "ws://127.0.0.1:1".to_string(),
            shard_count: count,
            shard_ids: ids,
            max_concurrency: 1,
            identify_stagger: Duration::from_secs(5),
            identify: IdentifyOptions::new("token", Intents::NON_PRIVILEGED),
            runner: RunnerOptions {
                hello_timeout: Duration::from_secs(2),
                commands_per_minute: 120,
                api_version: 10,
            },
            reconnect: ReconnectConfig {
                min_delay_ms: 60_000,
                max_delay_ms: 120_000,
                factor: 2.0,
            },
        }
    }

    fn manager(count: u32, ids: Vec<u32>) -> ShardManager {
        let (events, _) = mpsc::channel(8);
        ShardManager::new(config(count, ids), events).unwrap()
    }

    #[test]
    fn test_rejects_bad_shard_lists() {
        let (events, _) = mpsc::channel(8);
        let err = ShardManager::new(config(2, vec![0, 2]), events.clone()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let err = ShardManager::new(config(2, vec![]), events.clone()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let err = ShardManager::new(config(2, vec![1, 1]), events).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_routing() {
        let manager = manager(4, vec![0, 1, 2, 3]);
        assert_eq!(manager.shard_for(10), 2);
        assert_eq!(manager.shard_for(12), 0);

        let guild = Snowflake::new(3 << 22);
        assert_eq!(manager.shard_for_guild(guild), 3);
        assert_eq!(manager.shard_ids(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_initial_states() {
        let manager = manager(2, vec![1]);
        let states = manager.states();
        assert_eq!(states.len(), 1);
        assert_eq!(states[&1], ConnectionState::Disconnected);
        assert_eq!(manager.latencies()[&1], None);
        assert_eq!(manager.average_latency(), None);
    }

    #[tokio::test]
    async fn test_broadcast_to_foreign_shard() {
        let manager = manager(2, vec![0]);
        let err = manager
            .broadcast(1, GatewayMessage::heartbeat(None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let err = manager
            .broadcast(0, GatewayMessage::heartbeat(None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
    }

    #[tokio::test]
    async fn test_presence_status_is_checked() {
        let manager = manager(1, vec![0]);
        let err = manager
            .update_presence(&PresenceUpdatePayload::new("busy"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[tokio::test]
    async fn test_run_and_shutdown() {
        let manager = Arc::new(manager(2, vec![0, 1]));
        let running = tokio::spawn({
            let manager = manager.clone();
            async move { manager.run().await }
        });

        manager
            .shard(0)
            .unwrap()
            .wait_for(ConnectionState::Reconnecting)
            .await
            .unwrap();
        manager.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(3), running)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(manager.states().values().all(|s| s.is_closed()));

        let again = manager.run().await.unwrap_err();
        assert_eq!(again.kind(), ErrorKind::InvalidConfiguration);
    }
}
