//! Error taxonomy surfaced to library users

mod api_error;
mod client_error;

pub use api_error::{ApiError, FieldError};
pub use client_error::{ClientError, ClientResult, ErrorKind};
