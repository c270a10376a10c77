//! Engine configuration.
//!
//! Deserialized from the host's config file; every field has a default so
//! an empty document yields a working engine.

use serde::Deserialize;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Post-commit search indexer settings.
    pub indexer: IndexerConfig,
}

/// Search-indexer retry settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Submission attempts per committed mutation.
    pub retry_attempts: u32,
    /// Sleep between attempts, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self { retry_attempts: 5, retry_backoff_ms: 10 }
    }
}
