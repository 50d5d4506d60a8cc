//! Connection lifecycle states

use serde::Serialize;

/// Where a shard's connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingHello,
    Identifying,
    Resuming,
    Connected,
    Reconnecting,
    /// Terminal: shut down by the owner or stopped by a fatal error
    ClosedPermanently,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::ClosedPermanently => "closed_permanently",
        }
    }

    /// A socket is open in this state
    #[must_use]
    pub const fn has_socket(self) -> bool {
        matches!(
            self,
            Self::AwaitingHello | Self::Identifying | Self::Resuming | Self::Connected
        )
    }

    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::ClosedPermanently)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
