//! Test fixtures and data generators
//!
//! Client settings tuned for fast tests and the payloads the mock services
//! send back.

use std::time::Duration;

use chord_common::{ClientConfig, HttpConfig, ReconnectConfig};
use chord_core::{Intents, ShardInfo};
use chord_gateway::{IdentifyOptions, RunnerOptions, ShardManagerConfig};
use serde_json::{json, Value};

pub const TOKEN: &str = "test-token";

/// Reconnect quickly between scripted connections
pub fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        min_delay_ms: 10,
        max_delay_ms: 50,
        factor: 2.0,
    }
}

/// REST settings with short retry delays
pub fn http_config(base_url: String) -> HttpConfig {
    HttpConfig {
        base_url,
        max_attempts: 3,
        server_error_backoff_ms: 10,
        ..HttpConfig::default()
    }
}

/// Client pointed at a mock gateway (and optionally a mock REST API)
pub fn client_config(gateway_url: Option<&str>, api_base_url: Option<String>) -> ClientConfig {
    let mut config = ClientConfig::new(TOKEN);
    config.gateway.url = gateway_url.map(str::to_string);
    config.gateway.hello_timeout_ms = 2_000;
    config.reconnect = fast_reconnect();
    if let Some(base_url) = api_base_url {
        config.http = http_config(base_url);
    }
    config
}

/// One local shard against `gateway_url`
pub fn shard_config(gateway_url: &str) -> ShardManagerConfig {
    ShardManagerConfig {
        gateway_url: gateway_url.to_string(),
        shard_count: ShardInfo::ONE.count(),
        shard_ids: vec![0],
        max_concurrency: 1,
        identify_stagger: Duration::from_millis(10),
        identify: IdentifyOptions::new(TOKEN, Intents::NON_PRIVILEGED),
        runner: RunnerOptions {
            hello_timeout: Duration::from_secs(2),
            commands_per_minute: 120,
            api_version: 10,
        },
        reconnect: fast_reconnect(),
    }
}

/// READY payload pointing resumes back at `resume_url`
pub fn ready(session_id: &str, resume_url: &str) -> Value {
    json!({
        "v": 10,
        "session_id": session_id,
        "resume_gateway_url": resume_url,
        "user": { "id": "1", "username": "chord-test" },
        "guilds": [],
    })
}

pub fn message_create(content: &str) -> Value {
    json!({
        "id": "1001",
        "channel_id": "2002",
        "guild_id": "3003",
        "content": content,
    })
}

/// Autocomplete interaction for `/fruit name:<typed>`
pub fn autocomplete_interaction(id: u64, typed: &str) -> Value {
    json!({
        "id": id.to_string(),
        "application_id": "42",
        "type": 4,
        "token": format!("interaction-token-{id}"),
        "data": {
            "name": "fruit",
            "options": [{ "name": "name", "type": 3, "value": typed, "focused": true }],
        },
    })
}

/// Body of a 400 with per-field errors
pub fn invalid_form_body() -> Value {
    json!({
        "code": 50035,
        "message": "Invalid Form Body",
        "errors": {
            "content": { "_errors": [{ "code": "BASE_TYPE_MAX_LENGTH", "message": "Must be 2000 or fewer in length." }] },
        },
    })
}
