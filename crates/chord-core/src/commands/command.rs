//! Application command descriptor

use crate::error::CoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use validator::{Validate, ValidationError};

/// Kind of application command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    /// Slash command
    ChatInput = 1,
    /// Context menu command on a user
    User = 2,
    /// Context menu command on a message
    Message = 3,
}

impl CommandKind {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::ChatInput),
            2 => Some(Self::User),
            3 => Some(Self::Message),
            _ => None,
        }
    }
}

impl Serialize for CommandKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for CommandKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid command type: {value}")))
    }
}

/// Type of a command option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OptionKind {
    SubCommand = 1,
    SubCommandGroup = 2,
    String = 3,
    Integer = 4,
    Boolean = 5,
    User = 6,
    Channel = 7,
    Role = 8,
    Mentionable = 9,
    Number = 10,
    Attachment = 11,
}

impl OptionKind {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::SubCommand),
            2 => Some(Self::SubCommandGroup),
            3 => Some(Self::String),
            4 => Some(Self::Integer),
            5 => Some(Self::Boolean),
            6 => Some(Self::User),
            7 => Some(Self::Channel),
            8 => Some(Self::Role),
            9 => Some(Self::Mentionable),
            10 => Some(Self::Number),
            11 => Some(Self::Attachment),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SubCommand => "sub_command",
            Self::SubCommandGroup => "sub_command_group",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::User => "user",
            Self::Channel => "channel",
            Self::Role => "role",
            Self::Mentionable => "mentionable",
            Self::Number => "number",
            Self::Attachment => "attachment",
        }
    }

    /// Integer and number options accept min/max bounds
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }

    /// Only string, integer and number options can be autocompleted
    #[must_use]
    pub const fn supports_autocomplete(self) -> bool {
        matches!(self, Self::String | Self::Integer | Self::Number)
    }

    /// Whether a JSON value is acceptable for this option type
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            _ => false,
        }
    }
}

impl Serialize for OptionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for OptionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid option type: {value}")))
    }
}

/// Names must be lowercase and contain only letters, digits, `-` and `_`
fn validate_command_name(name: &str) -> Result<(), ValidationError> {
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("command_name"))
    }
}

/// A fixed choice offered for an option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CommandOptionChoice {
    #[validate(length(min = 1, max = 100, message = "Choice name must be 1-100 characters"))]
    pub name: String,
    pub value: Value,
}

/// A parameter of an application command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CommandOption {
    #[serde(rename = "type")]
    pub kind: OptionKind,

    #[validate(
        length(min = 1, max = 32, message = "Option name must be 1-32 characters"),
        custom(function = "validate_command_name")
    )]
    pub name: String,

    #[validate(length(min = 1, max = 100, message = "Option description must be 1-100 characters"))]
    pub description: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(length(max = 25, message = "At most 25 choices"), nested)]
    pub choices: Vec<CommandOptionChoice>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(length(max = 25, message = "At most 25 options"), nested)]
    pub options: Vec<CommandOption>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,

    #[serde(default)]
    pub autocomplete: bool,
}

impl CommandOption {
    /// Create an optional parameter
    #[must_use]
    pub fn new(kind: OptionKind, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            required: false,
            choices: Vec::new(),
            options: Vec::new(),
            min_value: None,
            max_value: None,
            autocomplete: false,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_autocomplete(mut self) -> Self {
        self.autocomplete = true;
        self
    }

    #[must_use]
    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    #[must_use]
    pub fn with_choice(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.choices.push(CommandOptionChoice {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn with_option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }

    /// Type rules the schema validator cannot express
    fn check_semantics(&self) -> Result<(), CoreError> {
        if (self.min_value.is_some() || self.max_value.is_some()) && !self.kind.is_numeric() {
            return Err(CoreError::MinMaxType {
                option: self.name.clone(),
                kind: self.kind.name(),
            });
        }

        if self.autocomplete {
            if !self.kind.supports_autocomplete() {
                return Err(CoreError::AutocompleteType {
                    option: self.name.clone(),
                    kind: self.kind.name(),
                });
            }
            if !self.choices.is_empty() {
                return Err(CoreError::InvalidCommand(format!(
                    "option '{}' cannot have both choices and autocomplete",
                    self.name
                )));
            }
        }

        if let Some(choice) = self.choices.iter().find(|c| !self.kind.accepts(&c.value)) {
            return Err(CoreError::InvalidCommand(format!(
                "choice '{}' does not match option type {}",
                choice.name,
                self.kind.name()
            )));
        }

        self.options.iter().try_for_each(CommandOption::check_semantics)
    }
}

/// Descriptor for an application command registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ApplicationCommand {
    #[serde(rename = "type")]
    pub kind: CommandKind,

    #[validate(length(min = 1, max = 32, message = "Command name must be 1-32 characters"))]
    pub name: String,

    #[validate(length(max = 100, message = "Description must be at most 100 characters"))]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(length(max = 25, message = "At most 25 options"), nested)]
    pub options: Vec<CommandOption>,
}

impl ApplicationCommand {
    /// Create a slash command
    #[must_use]
    pub fn slash(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::ChatInput,
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
        }
    }

    /// Create a user or message context menu command
    #[must_use]
    pub fn context_menu(kind: CommandKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: String::new(),
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }

    /// Validate the descriptor
    ///
    /// Slash commands need a lowercase name and a description; context menu
    /// commands take no description and no options.
    pub fn validate_descriptor(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::InvalidCommand(e.to_string()))?;

        match self.kind {
            CommandKind::ChatInput => {
                validate_command_name(&self.name).map_err(|_| {
                    CoreError::InvalidCommand(format!(
                        "slash command name '{}' must be lowercase",
                        self.name
                    ))
                })?;
                if self.description.is_empty() {
                    return Err(CoreError::InvalidCommand(format!(
                        "slash command '{}' needs a description",
                        self.name
                    )));
                }
            }
            CommandKind::User | CommandKind::Message => {
                if !self.options.is_empty() || !self.description.is_empty() {
                    return Err(CoreError::InvalidCommand(format!(
                        "context menu command '{}' takes no options or description",
                        self.name
                    )));
                }
            }
        }

        self.options.iter().try_for_each(CommandOption::check_semantics)
    }
}
