//! Typed endpoints used by the gateway layer and the client facade

use crate::route::Route;
use crate::transport::{HttpTransport, RequestOptions};
use chord_common::{ClientError, ClientResult};
use chord_core::{ApplicationCommand, Snowflake};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

/// Identify budget reported by `GET /gateway/bot`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` resets
    pub reset_after: u64,
    /// Shards that may identify in the same 5 second window
    pub max_concurrency: u32,
}

impl Default for SessionStartLimit {
    fn default() -> Self {
        Self {
            total: 1000,
            remaining: 1000,
            reset_after: 0,
            max_concurrency: 1,
        }
    }
}

/// Gateway connection details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayBot {
    pub url: String,
    /// Recommended shard count
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

#[derive(Deserialize)]
struct GatewayBotBody {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    shards: Option<u32>,
    #[serde(default)]
    session_start_limit: Option<SessionStartLimit>,
}

impl HttpTransport {
    /// Gateway URL and recommended sharding
    pub async fn get_gateway_bot(&self) -> ClientResult<GatewayBot> {
        let response = self.request(Route::get("/gateway/bot"), None).await?;
        let body: GatewayBotBody = response.json()?;

        let url = body
            .url
            .filter(|url| !url.is_empty())
            .ok_or(ClientError::GatewayNotFound)?;

        Ok(GatewayBot {
            url,
            shards: body.shards.unwrap_or(1).max(1),
            session_start_limit: body.session_start_limit.unwrap_or_default(),
        })
    }

    /// Replace every global command of the application
    ///
    /// Descriptors are validated before anything is sent.
    pub async fn bulk_overwrite_commands(
        &self,
        application_id: Snowflake,
        commands: &[ApplicationCommand],
    ) -> ClientResult<Vec<Value>> {
        for command in commands {
            command.validate_descriptor()?;
        }

        let route = Route::put("/applications/{application_id}/commands").param("application_id", application_id);
        let body = serde_json::to_value(commands)
            .map_err(|e| ClientError::invalid_configuration(format!("unserializable commands: {e}")))?;
        let registered: Vec<Value> = self.request(route, Some(body)).await?.json()?;

        info!(application_id = %application_id, count = registered.len(), "Application commands registered");
        Ok(registered)
    }

    /// Answer an interaction
    pub async fn create_interaction_response(
        &self,
        interaction_id: Snowflake,
        interaction_token: &str,
        body: Value,
    ) -> ClientResult<()> {
        let route = Route::post("/interactions/{interaction_id}/{interaction_token}/callback")
            .param("interaction_id", interaction_id)
            .param("interaction_token", interaction_token);
        self.request_with(&route, RequestOptions::json(body)).await?;
        Ok(())
    }
}
