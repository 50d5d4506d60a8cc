//! Integration test utilities for the chord client
//!
//! This crate provides a scripted gateway and a mock REST API for end-to-end
//! tests of the shard runners, the dispatcher and the HTTP transport.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
