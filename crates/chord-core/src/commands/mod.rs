//! Application command descriptors
//!
//! Commands are registered with an explicit descriptor instead of decorator
//! sugar. Descriptors are validated locally before they are sent.

mod autocomplete;
mod command;

pub use autocomplete::{AutocompleteChoice, AutocompleteResponse};
pub use command::{ApplicationCommand, CommandKind, CommandOption, CommandOptionChoice, OptionKind};
