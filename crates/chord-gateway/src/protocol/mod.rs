//! Gateway protocol definitions
//!
//! Op codes, the frame format, close codes and payloads.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseAction, CloseCode};
pub use messages::GatewayMessage;
pub use opcodes::{Direction, OpCode};
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload, ReadyPayload,
    RequestGuildMembersPayload, ResumePayload,
};
