//! Core errors - failures building value objects and command descriptors

use thiserror::Error;

/// Errors raised while constructing core value objects
#[derive(Debug, Error)]
pub enum CoreError {
    // =========================================================================
    // Sharding
    // =========================================================================
    #[error("Invalid shard [{id}, {count}]: id must be below a non-zero count")]
    InvalidShard { id: u32, count: u32 },

    // =========================================================================
    // Command descriptors
    // =========================================================================
    #[error("Invalid application command: {0}")]
    InvalidCommand(String),

    #[error("Option '{option}' of type {kind} cannot have a min and/or max value")]
    MinMaxType { option: String, kind: &'static str },

    #[error("Option '{option}' of type {kind} cannot be autocompleted")]
    AutocompleteType { option: String, kind: &'static str },

    #[error("Autocomplete response has {count} choices (max {max})")]
    TooManyChoices { count: usize, max: usize },

    #[error("Autocomplete choice value does not match the focused option type")]
    ChoiceTypeMismatch,
}

impl CoreError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidShard { .. } => "INVALID_SHARD",
            Self::InvalidCommand(_) => "INVALID_COMMAND",
            Self::MinMaxType { .. } => "MIN_MAX_TYPE",
            Self::AutocompleteType { .. } => "AUTOCOMPLETE_TYPE",
            Self::TooManyChoices { .. } => "TOO_MANY_CHOICES",
            Self::ChoiceTypeMismatch => "CHOICE_TYPE_MISMATCH",
        }
    }
}
