//! Gateway intents
//!
//! Intents select which event groups the gateway sends to a session. Some of
//! them are privileged and must be enabled for the application by the service
//! before an Identify that requests them is accepted.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// Gateway intent flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        const GUILDS                    = 1 << 0;
        /// Privileged
        const GUILD_MEMBERS             = 1 << 1;
        const GUILD_MODERATION          = 1 << 2;
        const GUILD_EMOJIS_AND_STICKERS = 1 << 3;
        const GUILD_INTEGRATIONS        = 1 << 4;
        const GUILD_WEBHOOKS            = 1 << 5;
        const GUILD_INVITES             = 1 << 6;
        const GUILD_VOICE_STATES        = 1 << 7;
        /// Privileged
        const GUILD_PRESENCES           = 1 << 8;
        const GUILD_MESSAGES            = 1 << 9;
        const GUILD_MESSAGE_REACTIONS   = 1 << 10;
        const GUILD_MESSAGE_TYPING      = 1 << 11;
        const DIRECT_MESSAGES           = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS  = 1 << 13;
        const DIRECT_MESSAGE_TYPING     = 1 << 14;
        /// Privileged
        const MESSAGE_CONTENT           = 1 << 15;

        /// Intents that require explicit approval for the application
        const PRIVILEGED = Self::GUILD_MEMBERS.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::MESSAGE_CONTENT.bits();

        /// Everything except the privileged intents
        const NON_PRIVILEGED = Self::GUILDS.bits()
            | Self::GUILD_MODERATION.bits()
            | Self::GUILD_EMOJIS_AND_STICKERS.bits()
            | Self::GUILD_INTEGRATIONS.bits()
            | Self::GUILD_WEBHOOKS.bits()
            | Self::GUILD_INVITES.bits()
            | Self::GUILD_VOICE_STATES.bits()
            | Self::GUILD_MESSAGES.bits()
            | Self::GUILD_MESSAGE_REACTIONS.bits()
            | Self::GUILD_MESSAGE_TYPING.bits()
            | Self::DIRECT_MESSAGES.bits()
            | Self::DIRECT_MESSAGE_REACTIONS.bits()
            | Self::DIRECT_MESSAGE_TYPING.bits();
    }
}

impl Intents {
    /// Whether any privileged intent is requested
    #[inline]
    pub fn is_privileged(&self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }

    /// Parse a comma separated list of flag names (`GUILDS,GUILD_MESSAGES`) or a
    /// raw integer.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if let Ok(bits) = trimmed.parse::<u64>() {
            return Self::from_bits(bits);
        }

        let mut intents = Self::empty();
        for name in trimmed.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            intents |= Self::from_name(&name.to_ascii_uppercase())?;
        }
        Some(intents)
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::NON_PRIVILEGED
    }
}

impl fmt::Display for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

// Identify sends intents as a plain integer
impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}
