//! Interaction payloads
//!
//! The parts of `INTERACTION_CREATE` needed to route an interaction and answer
//! it. Everything else stays available through the raw event data.

use chord_core::{OptionKind, Snowflake};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InteractionKind {
    Ping = 1,
    ApplicationCommand = 2,
    MessageComponent = 3,
    Autocomplete = 4,
    ModalSubmit = 5,
}

impl InteractionKind {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Ping),
            2 => Some(Self::ApplicationCommand),
            3 => Some(Self::MessageComponent),
            4 => Some(Self::Autocomplete),
            5 => Some(Self::ModalSubmit),
            _ => None,
        }
    }
}

impl Serialize for InteractionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for InteractionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value).ok_or_else(|| serde::de::Error::custom(format!("invalid interaction type: {value}")))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Interaction {
    pub id: Snowflake,
    pub application_id: Snowflake,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    /// Continuation token for the callback and follow-ups
    pub token: String,
    #[serde(default)]
    pub data: Option<InteractionData>,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InteractionData {
    #[serde(default)]
    pub id: Option<Snowflake>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub options: Vec<InteractionOption>,
    /// Set for component interactions
    #[serde(default)]
    pub custom_id: Option<String>,
}

/// An option value as the user filled it in
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InteractionOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    #[serde(default)]
    pub value: Option<Value>,
    /// The option the user is typing in, for autocomplete
    #[serde(default)]
    pub focused: bool,
    /// Nested options of a subcommand or group
    #[serde(default)]
    pub options: Vec<InteractionOption>,
}

fn find<'a>(options: &'a [InteractionOption], matches: &dyn Fn(&InteractionOption) -> bool) -> Option<&'a InteractionOption> {
    options.iter().find_map(|option| {
        if matches(option) {
            Some(option)
        } else {
            find(&option.options, matches)
        }
    })
}

impl Interaction {
    #[must_use]
    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.name.as_str())
    }

    /// The option being autocompleted, searched through subcommands
    #[must_use]
    pub fn focused_option(&self) -> Option<&InteractionOption> {
        self.data.as_ref().and_then(|d| find(&d.options, &|o: &InteractionOption| o.focused))
    }

    /// Value option with the given name, searched through subcommands
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&InteractionOption> {
        self.data
            .as_ref()
            .and_then(|d| find(&d.options, &|o: &InteractionOption| o.name == name && o.value.is_some()))
    }
}
