//! Client error types
//!
//! Every failure the client surfaces carries a stable [`ErrorKind`] so callers
//! can branch on the category instead of the message.

use crate::config::ConfigError;
use crate::error::ApiError;
use chord_core::CoreError;
use std::fmt;
use std::time::Duration;

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Socket or HTTP transport failure, timeouts, unexpected closes
    Connectivity,
    /// Credentials rejected (REST 401/403, gateway close 4004)
    Authentication,
    /// Requested privileged intents are not enabled for the application
    PrivilegedCapability,
    /// 429 retries exhausted
    RateLimitExceeded,
    /// Non-retryable 4xx
    ClientRequest,
    /// 5xx retries exhausted
    ServerFault,
    /// Frame or body that does not follow the protocol
    ProtocolViolation,
    /// Second response to the same interaction
    AlreadyResponded,
    /// Invalid shard setup, intents, command descriptors or settings
    InvalidConfiguration,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connectivity => "CONNECTIVITY_ERROR",
            Self::Authentication => "AUTHENTICATION_ERROR",
            Self::PrivilegedCapability => "PRIVILEGED_CAPABILITY_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::ClientRequest => "CLIENT_REQUEST_ERROR",
            Self::ServerFault => "SERVER_FAULT",
            Self::ProtocolViolation => "PROTOCOL_VIOLATION",
            Self::AlreadyResponded => "ALREADY_RESPONDED",
            Self::InvalidConfiguration => "INVALID_CONFIGURATION",
        }
    }

    /// Fatal kinds close the session permanently and reach the owner
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Authentication | Self::PrivilegedCapability | Self::InvalidConfiguration
        )
    }

    /// Transient kinds are retried internally before surfacing
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity | Self::RateLimitExceeded | Self::ServerFault)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-wide error type
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    // Connectivity
    #[error("Connection error: {0}")]
    Connectivity(String),

    #[error("Gateway URL could not be discovered")]
    GatewayNotFound,

    #[error("Shard {shard_id} connection closed with code {code}: {reason}")]
    ConnectionClosed {
        shard_id: u32,
        code: u16,
        reason: String,
    },

    #[error("Shard {shard_id} did not receive HELLO within {timeout:?}")]
    HelloTimeout { shard_id: u32, timeout: Duration },

    #[error("Client is shut down")]
    Closed,

    // Authentication
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(ApiError),

    #[error("Forbidden: {0}")]
    Forbidden(ApiError),

    #[error("Shard {shard_id} requested privileged intents that have not been enabled for the application")]
    PrivilegedIntentsRequired { shard_id: u32 },

    // Rate limiting
    #[error("Rate limited on {route} after {attempts} attempts (retry after {retry_after:?})")]
    RateLimited {
        route: String,
        attempts: u32,
        retry_after: Duration,
    },

    // Request errors
    #[error("Request failed: {0}")]
    ClientRequest(ApiError),

    #[error("Server error after {attempts} attempts: {error}")]
    ServerFault { attempts: u32, error: ApiError },

    // Protocol
    #[error("Protocol violation: {0}")]
    Protocol(String),

    // Interactions
    #[error("This interaction has already been responded to")]
    AlreadyResponded,

    // Configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ClientError {
    /// Category of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connectivity(_)
            | Self::GatewayNotFound
            | Self::ConnectionClosed { .. }
            | Self::HelloTimeout { .. }
            | Self::Closed => ErrorKind::Connectivity,

            Self::Authentication(_) | Self::Unauthorized(_) | Self::Forbidden(_) => {
                ErrorKind::Authentication
            }

            Self::PrivilegedIntentsRequired { .. } => ErrorKind::PrivilegedCapability,
            Self::RateLimited { .. } => ErrorKind::RateLimitExceeded,
            Self::ClientRequest(_) => ErrorKind::ClientRequest,
            Self::ServerFault { .. } => ErrorKind::ServerFault,
            Self::Protocol(_) => ErrorKind::ProtocolViolation,
            Self::AlreadyResponded => ErrorKind::AlreadyResponded,

            Self::InvalidConfiguration(_) | Self::Config(_) | Self::Core(_) => {
                ErrorKind::InvalidConfiguration
            }
        }
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Decoded REST error body, when the failure came from a response
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Unauthorized(e)
            | Self::Forbidden(e)
            | Self::ClientRequest(e)
            | Self::ServerFault { error: e, .. } => Some(e),
            _ => None,
        }
    }

    /// HTTP status of the failed response
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            _ => self.api_error().map(|e| e.status),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ClientRequest(e) if e.is_not_found())
    }

    /// Create a connectivity error
    #[must_use]
    pub fn connectivity(msg: impl fmt::Display) -> Self {
        Self::Connectivity(msg.to_string())
    }

    /// Create a protocol violation
    #[must_use]
    pub fn protocol(msg: impl fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create an invalid configuration error
    #[must_use]
    pub fn invalid_configuration(msg: impl fmt::Display) -> Self {
        Self::InvalidConfiguration(msg.to_string())
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> ApiError {
        ApiError::from_response(status, r#"{"code": 0, "message": "nope"}"#)
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ClientError::connectivity("reset").kind(), ErrorKind::Connectivity);
        assert_eq!(ClientError::GatewayNotFound.kind(), ErrorKind::Connectivity);
        assert_eq!(ClientError::Unauthorized(api(401)).kind(), ErrorKind::Authentication);
        assert_eq!(ClientError::Forbidden(api(403)).kind(), ErrorKind::Authentication);
        assert_eq!(
            ClientError::PrivilegedIntentsRequired { shard_id: 0 }.kind(),
            ErrorKind::PrivilegedCapability
        );
        assert_eq!(ClientError::ClientRequest(api(400)).kind(), ErrorKind::ClientRequest);
        assert_eq!(
            ClientError::ServerFault { attempts: 5, error: api(502) }.kind(),
            ErrorKind::ServerFault
        );
        assert_eq!(ClientError::protocol("bad frame").kind(), ErrorKind::ProtocolViolation);
        assert_eq!(ClientError::AlreadyResponded.kind(), ErrorKind::AlreadyResponded);
        assert_eq!(
            ClientError::from(CoreError::InvalidShard { id: 2, count: 2 }).kind(),
            ErrorKind::InvalidConfiguration
        );
    }

    #[test]
    fn test_fatal_and_retryable() {
        assert!(ClientError::Authentication("4004".to_string()).is_fatal());
        assert!(ClientError::PrivilegedIntentsRequired { shard_id: 1 }.is_fatal());
        assert!(ClientError::invalid_configuration("shard").is_fatal());
        assert!(!ClientError::connectivity("reset").is_fatal());

        assert!(ClientError::connectivity("reset").is_retryable());
        assert!(ClientError::ServerFault { attempts: 1, error: api(500) }.is_retryable());
        assert!(!ClientError::ClientRequest(api(400)).is_retryable());
        assert!(!ClientError::AlreadyResponded.is_retryable());
    }

    #[test]
    fn test_status_and_not_found() {
        let err = ClientError::ClientRequest(api(404));
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());

        let err = ClientError::RateLimited {
            route: "GET /gateway/bot".to_string(),
            attempts: 3,
            retry_after: Duration::from_secs(1),
        };
        assert_eq!(err.status(), Some(429));
        assert!(!err.is_not_found());
        assert_eq!(ClientError::Closed.status(), None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::ClientRequest.to_string(), "CLIENT_REQUEST_ERROR");
        assert_eq!(ErrorKind::ServerFault.as_str(), "SERVER_FAULT");
    }
}
