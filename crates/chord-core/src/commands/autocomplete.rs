//! Autocomplete suggestions for a focused command option

use crate::commands::OptionKind;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A suggested value shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteChoice {
    pub name: String,
    pub value: Value,
}

/// Ordered list of suggestions answering an autocomplete interaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutocompleteResponse {
    choices: Vec<AutocompleteChoice>,
}

impl AutocompleteResponse {
    /// The service shows at most this many suggestions
    pub const MAX_CHOICES: usize = 25;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a suggestion, keeping insertion order
    pub fn add_choice(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.choices.push(AutocompleteChoice {
            name: name.into(),
            value: value.into(),
        });
    }

    #[must_use]
    pub fn with_choice(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_choice(name, value);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.choices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Build the callback `data` object for the focused option type
    pub fn into_callback_data(self, focused: OptionKind) -> Result<Value, CoreError> {
        if self.choices.len() > Self::MAX_CHOICES {
            return Err(CoreError::TooManyChoices {
                count: self.choices.len(),
                max: Self::MAX_CHOICES,
            });
        }
        if self.choices.iter().any(|c| !focused.accepts(&c.value)) {
            return Err(CoreError::ChoiceTypeMismatch);
        }
        Ok(serde_json::json!({ "choices": self.choices }))
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for AutocompleteResponse {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut response = Self::new();
        for (name, value) in iter {
            response.add_choice(name, value);
        }
        response
    }
}
