//! Well-known metadata keys

use std::fmt::Display;

/// Metadata keys with a meaning shared across the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    /// When the peer was first added to the store
    Discovered,
    /// Agent version reported by identify
    AgentVersion,
    /// Protocol version reported by identify
    ProtocolVersion,
    /// Time of the last completed handshake
    LastHandshake,
    /// Latest measured round-trip time
    LatestPing,
}

impl MetadataKey {
    /// The stored key string
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataKey::Discovered => "Discovered",
            MetadataKey::AgentVersion => "AgentVersion",
            MetadataKey::ProtocolVersion => "ProtocolVersion",
            MetadataKey::LastHandshake => "LastHandshake",
            MetadataKey::LatestPing => "LatestPing",
        }
    }
}

impl Display for MetadataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for MetadataKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
