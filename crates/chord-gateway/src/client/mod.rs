//! Client facade
//!
//! One object owning the REST transport, the shard manager and the event
//! dispatcher.

mod responder;

pub use responder::{CallbackKind, InteractionResponder};

use crate::dispatch::{EventDispatcher, Listener, ListenerId};
use crate::events::Interaction;
use crate::session::ConnectionState;
use crate::shard::{ShardManager, ShardManagerConfig};
use chord_common::{ClientConfig, ClientError, ClientResult};
use chord_core::ApplicationCommand;
use chord_http::{HttpResponse, HttpTransport, Route};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

pub struct Client {
    config: ClientConfig,
    http: Arc<HttpTransport>,
    dispatcher: Arc<EventDispatcher>,
    shards: Mutex<Option<Arc<ShardManager>>>,
    shutdown: watch::Sender<bool>,
}

impl Client {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let http = Arc::new(HttpTransport::new(&config.token, &config.http)?);
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            http,
            dispatcher: EventDispatcher::new_shared(),
            shards: Mutex::new(None),
            shutdown,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn http(&self) -> &Arc<HttpTransport> {
        &self.http
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Register a listener for an event name (`"*"` for every event)
    pub fn subscribe(&self, event: impl Into<String>, listener: impl Listener) -> ListenerId {
        self.dispatcher.subscribe(event, listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Rate-limited REST call
    pub async fn issue_request(&self, route: Route, body: Option<Value>) -> ClientResult<HttpResponse> {
        self.http.request(route, body).await
    }

    /// Replace the application's global commands
    pub async fn register_commands(&self, commands: &[ApplicationCommand]) -> ClientResult<Vec<Value>> {
        let application_id = self
            .config
            .application_id
            .ok_or_else(|| ClientError::invalid_configuration("application id is required to register commands"))?;
        self.http.bulk_overwrite_commands(application_id, commands).await
    }

    #[must_use]
    pub fn responder(&self, interaction: &Interaction) -> InteractionResponder {
        InteractionResponder::new(self.http.clone(), interaction)
    }

    /// Shard manager, once [`Client::start`] has built it
    #[must_use]
    pub fn shards(&self) -> Option<Arc<ShardManager>> {
        self.shards.lock().clone()
    }

    #[must_use]
    pub fn states(&self) -> BTreeMap<u32, ConnectionState> {
        self.shards().map(|s| s.states()).unwrap_or_default()
    }

    #[must_use]
    pub fn latencies(&self) -> BTreeMap<u32, Option<Duration>> {
        self.shards().map(|s| s.latencies()).unwrap_or_default()
    }

    /// Connect every shard and deliver events until shutdown
    ///
    /// Returns `Ok` after [`Client::shutdown`], or the first fatal shard error.
    pub async fn start(&self) -> ClientResult<()> {
        if *self.shutdown.borrow() {
            return Err(ClientError::Closed);
        }
        if self.shards.lock().is_some() {
            return Err(ClientError::invalid_configuration("client already started"));
        }

        let gateway = &self.config.gateway;
        let (url, recommended, max_concurrency) = match &gateway.url {
            Some(url) => (url.clone(), gateway.shard_count.unwrap_or(1), 1),
            None => {
                let bot = self.http.get_gateway_bot().await?;
                let limit = bot.session_start_limit;
                if limit.remaining < bot.shards {
                    warn!(
                        remaining = limit.remaining,
                        reset_after_ms = limit.reset_after,
                        "Session start limit nearly exhausted"
                    );
                }
                (bot.url, bot.shards, limit.max_concurrency)
            }
        };

        let manager_config = ShardManagerConfig::from_client_config(&self.config, url, recommended, max_concurrency);
        let (events_tx, events_rx) = mpsc::channel(gateway.dispatch_buffer.max(1));
        let manager = Arc::new(ShardManager::new(manager_config, events_tx)?);
        {
            let mut shards = self.shards.lock();
            if shards.is_some() {
                return Err(ClientError::invalid_configuration("client already started"));
            }
            *shards = Some(manager.clone());
        }
        if *self.shutdown.borrow() {
            manager.shutdown();
        }

        info!(
            app = %self.config.app.name,
            shards = manager.shard_count(),
            local = ?manager.shard_ids(),
            "Client starting"
        );

        let worker = self.dispatcher.spawn_worker(events_rx);
        let result = manager.run().await;
        // Runners are gone, so the event queue drains and closes
        let _ = worker.await;

        match &result {
            Ok(()) => info!("Client stopped"),
            Err(e) => warn!(error = %e, "Client stopped with error"),
        }
        result
    }

    /// Stop every shard; [`Client::start`] returns once they are closed
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        if let Some(manager) = self.shards.lock().as_ref() {
            manager.shutdown();
        }
    }
}
