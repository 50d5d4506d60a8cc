//! Interaction responses
//!
//! An interaction accepts exactly one initial response. The responder claims
//! that slot before sending; a failed send releases it again unless the
//! service reports the interaction as already acknowledged.

use crate::events::{Interaction, InteractionKind};
use chord_common::{ClientError, ClientResult};
use chord_core::{AutocompleteResponse, OptionKind, Snowflake};
use chord_http::HttpTransport;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Service error code for a second initial response
const ALREADY_ACKNOWLEDGED: u32 = 40060;

/// Interaction callback types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CallbackKind {
    Pong = 1,
    ChannelMessage = 4,
    DeferredChannelMessage = 5,
    DeferredUpdateMessage = 6,
    UpdateMessage = 7,
    AutocompleteResult = 8,
    Modal = 9,
}

pub struct InteractionResponder {
    http: Arc<HttpTransport>,
    interaction_id: Snowflake,
    token: String,
    kind: InteractionKind,
    focused: Option<OptionKind>,
    responded: AtomicBool,
}

impl InteractionResponder {
    #[must_use]
    pub fn new(http: Arc<HttpTransport>, interaction: &Interaction) -> Self {
        Self {
            http,
            interaction_id: interaction.id,
            token: interaction.token.clone(),
            kind: interaction.kind,
            focused: interaction.focused_option().map(|o| o.kind),
            responded: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn interaction_id(&self) -> Snowflake {
        self.interaction_id
    }

    /// Whether the initial response was sent
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.responded.load(Ordering::Acquire)
    }

    /// Send the initial response
    pub async fn respond(&self, kind: CallbackKind, data: Option<Value>) -> ClientResult<()> {
        if self.responded.swap(true, Ordering::AcqRel) {
            return Err(ClientError::AlreadyResponded);
        }

        let mut body = json!({ "type": kind as u8 });
        if let Some(data) = data {
            body["data"] = data;
        }

        match self
            .http
            .create_interaction_response(self.interaction_id, &self.token, body)
            .await
        {
            Ok(()) => {
                debug!(interaction_id = %self.interaction_id, kind = ?kind, "Interaction answered");
                Ok(())
            }
            Err(e) if e.api_error().is_some_and(|api| api.code == ALREADY_ACKNOWLEDGED) => {
                Err(ClientError::AlreadyResponded)
            }
            Err(e) => {
                self.responded.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Reply with a plain message
    pub async fn send_message(&self, content: impl Into<String>) -> ClientResult<()> {
        let content = content.into();
        self.respond(CallbackKind::ChannelMessage, Some(json!({ "content": content })))
            .await
    }

    /// Acknowledge now and follow up later
    pub async fn defer(&self) -> ClientResult<()> {
        self.respond(CallbackKind::DeferredChannelMessage, None).await
    }

    /// Answer an autocomplete interaction with suggestions for the focused option
    pub async fn autocomplete(&self, response: AutocompleteResponse) -> ClientResult<()> {
        if self.kind != InteractionKind::Autocomplete {
            return Err(ClientError::invalid_configuration(format!(
                "interaction {} is not an autocomplete request",
                self.interaction_id
            )));
        }
        let focused = self
            .focused
            .ok_or_else(|| ClientError::protocol("autocomplete interaction without a focused option"))?;
        let data = response.into_callback_data(focused)?;
        self.respond(CallbackKind::AutocompleteResult, Some(data)).await
    }
}
