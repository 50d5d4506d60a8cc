//! Event delivery to application listeners

mod dispatcher;
mod listener;

pub use dispatcher::{DispatchStats, EventDispatcher, ListenerId, WILDCARD};
pub use listener::Listener;
