//! Gateway session lifecycle
//!
//! Connection states, the data needed to resume, reconnect backoff and the
//! state machine tying them together.

mod backoff;
mod machine;
mod session;
mod state;

pub use backoff::Backoff;
pub use machine::{Action, IdentifyOptions, Input, SessionStateMachine, MAX_CONSECUTIVE_VIOLATIONS};
pub use session::Session;
pub use state::ConnectionState;
