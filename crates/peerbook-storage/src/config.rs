//! Peer store configuration

use serde::{Deserialize, Serialize};

use crate::retention::RetentionPolicy;

/// Configuration for a [`PeerRepository`](crate::PeerRepository)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerStoreConfig {
    /// Signed record retention
    pub retention: RetentionPolicy,
    /// Record a `Discovered` timestamp when a key is first added
    pub record_discovery: bool,
}

impl Default for PeerStoreConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            record_discovery: true,
        }
    }
}

impl PeerStoreConfig {
    /// Start building a configuration
    pub fn builder() -> PeerStoreConfigBuilder {
        PeerStoreConfigBuilder::default()
    }

    /// Maximum signed records kept per peer
    pub fn max_records_to_keep(&self) -> usize {
        self.retention.max_records_per_peer()
    }
}

/// Builder for PeerStoreConfig
#[derive(Debug, Default)]
pub struct PeerStoreConfigBuilder {
    max_records_to_keep: Option<usize>,
    record_discovery: Option<bool>,
}

impl PeerStoreConfigBuilder {
    /// Set the number of records kept per peer
    pub fn max_records_to_keep(mut self, max: usize) -> Self {
        self.max_records_to_keep = Some(max);
        self
    }

    /// Enable or disable the `Discovered` timestamp
    pub fn record_discovery(mut self, enabled: bool) -> Self {
        self.record_discovery = Some(enabled);
        self
    }

    /// Build the PeerStoreConfig
    pub fn build(self) -> PeerStoreConfig {
        let mut config = PeerStoreConfig::default();

        if let Some(max) = self.max_records_to_keep {
            config.retention = RetentionPolicy::new(max);
        }
        if let Some(enabled) = self.record_discovery {
            config.record_discovery = enabled;
        }

        config
    }
}
