//! Retry policy for post-commit indexing.

use std::time::Duration;

use folio_types::IndexerConfig;

/// Bounded-retry policy for search submissions.
///
/// The default matches the engine's post-commit contract: five attempts
/// with a 10 ms sleep between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Sleep between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 5, backoff: Duration::from_millis(10) }
    }
}

impl From<&IndexerConfig> for RetryPolicy {
    fn from(config: &IndexerConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_from_config_clamps_zero_attempts() {
        let config = IndexerConfig { retry_attempts: 0, retry_backoff_ms: 3 };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.backoff, Duration::from_millis(3));
    }
}
