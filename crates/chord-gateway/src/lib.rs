//! # chord-gateway
//!
//! Sharded gateway sessions, heartbeating, event dispatch and the client
//! facade tying them to the REST transport.
//!
//! Each shard runs a [`ShardRunner`] driving a sans-IO
//! [`SessionStateMachine`]; decoded dispatches flow through a bounded queue
//! into the [`EventDispatcher`].

pub mod client;
pub mod dispatch;
pub mod events;
pub mod heartbeat;
pub mod protocol;
pub mod session;
pub mod shard;
pub mod socket;

pub use client::{CallbackKind, Client, InteractionResponder};
pub use dispatch::{DispatchStats, EventDispatcher, Listener, ListenerId, WILDCARD};
pub use events::{Event, GatewayEventType, Interaction, InteractionData, InteractionKind, InteractionOption};
pub use heartbeat::{HeartbeatMonitor, HeartbeatState};
pub use protocol::{CloseAction, CloseCode, GatewayMessage, OpCode};
pub use session::{Action, Backoff, ConnectionState, IdentifyOptions, Input, Session, SessionStateMachine};
pub use shard::{IdentifyQueue, RunnerOptions, ShardHandle, ShardManager, ShardManagerConfig, ShardRunner};
pub use socket::{GatewaySocket, SocketEvent, SocketSender};
