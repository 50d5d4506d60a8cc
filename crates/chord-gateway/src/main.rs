//! Example bot
//!
//! Run with:
//! ```bash
//! CHORD_TOKEN=... CHORD_APPLICATION_ID=... cargo run -p chord-gateway
//! ```
//!
//! Registers a `/fruit` command whose `name` option is autocompleted, and
//! answers the command once a fruit is picked. Configuration is loaded from
//! environment variables (and `.env` when present).

use anyhow::Context;
use chord_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use chord_core::{ApplicationCommand, AutocompleteResponse, CommandOption, OptionKind};
use chord_gateway::{Client, Event, GatewayEventType, InteractionKind, InteractionResponder};
use chord_http::HttpTransport;
use std::sync::Arc;
use tracing::{error, info, warn};

const FRUITS: &[&str] = &[
    "Apple", "Apricot", "Avocado", "Banana", "Blackberry", "Blueberry", "Cherry", "Coconut",
    "Cranberry", "Date", "Dragonfruit", "Fig", "Grape", "Grapefruit", "Guava", "Kiwi", "Lemon",
    "Lime", "Lychee", "Mango", "Melon", "Nectarine", "Orange", "Papaya", "Passionfruit", "Peach",
    "Pear", "Pineapple", "Plum", "Pomegranate", "Raspberry", "Strawberry", "Tangerine",
    "Watermelon",
];

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing_with_config(TracingConfig::from_env()) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Bot stopped with error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("failed to load configuration")?;
    info!(app = %config.app.name, env = ?config.app.env, "Configuration loaded");

    let client = Arc::new(Client::new(config)?);

    client.subscribe(GatewayEventType::Ready.as_str(), |event: Arc<Event>| async move {
        let user = event.data["user"]["username"].as_str().unwrap_or("unknown").to_string();
        info!(shard_id = event.shard_id, user = %user, "Logged in");
        anyhow::Ok(())
    });

    let http = client.http().clone();
    client.subscribe(GatewayEventType::InteractionCreate.as_str(), move |event: Arc<Event>| {
        let http = http.clone();
        async move { handle_interaction(&http, &event).await }
    });

    if client.config().application_id.is_some() {
        let fruit = ApplicationCommand::slash("fruit", "Tells you about a fruit").with_option(
            CommandOption::new(OptionKind::String, "name", "Name of the fruit")
                .required()
                .with_autocomplete(),
        );
        client.register_commands(&[fruit]).await?;
        info!("Commands registered");
    } else {
        warn!("CHORD_APPLICATION_ID not set, skipping command registration");
    }

    tokio::spawn({
        let client = client.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                client.shutdown();
            }
        }
    });

    client.start().await?;
    Ok(())
}

async fn handle_interaction(http: &Arc<HttpTransport>, event: &Event) -> anyhow::Result<()> {
    let interaction = event.interaction()?;
    if interaction.command_name() != Some("fruit") {
        return Ok(());
    }
    let responder = InteractionResponder::new(http.clone(), &interaction);

    match interaction.kind {
        InteractionKind::Autocomplete => {
            let typed = interaction
                .focused_option()
                .and_then(|o| o.value.as_ref())
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            responder.autocomplete(suggest(typed)).await?;
        }
        InteractionKind::ApplicationCommand => {
            let picked = interaction
                .option("name")
                .and_then(|o| o.value.as_ref())
                .and_then(|v| v.as_str())
                .unwrap_or("nothing");
            responder.send_message(format!("You picked **{picked}**")).await?;
        }
        _ => {}
    }
    Ok(())
}

/// Fruits containing `typed`, case-insensitively; empty input gets no suggestions
fn suggest(typed: &str) -> AutocompleteResponse {
    let needle = typed.trim().to_lowercase();
    if needle.is_empty() {
        return AutocompleteResponse::new();
    }
    FRUITS
        .iter()
        .filter(|fruit| fruit.to_lowercase().contains(&needle))
        .take(AutocompleteResponse::MAX_CHOICES)
        .map(|fruit| (*fruit, *fruit))
        .collect()
}
