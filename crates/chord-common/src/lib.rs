//! # chord-common
//!
//! Shared utilities including configuration, the client error taxonomy, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppSettings, ClientConfig, ConfigError, Environment, GatewayConfig, HttpConfig,
    ReconnectConfig,
};
pub use error::{ApiError, ClientError, ClientResult, ErrorKind, FieldError};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
