//! Backoff policy for retryable sync errors.

use std::time::Duration;

use sheetsync_core::config::RetryConfig;

use crate::error::{SyncError, SyncErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Floor applied to rate-limit waits.
    pub rate_limit_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
            rate_limit_backoff: Duration::from_millis(cfg.rate_limit_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before the attempt after `attempt` (1-based) failed with `err`, or
    /// `None` when the error is terminal or attempts are used up.
    pub fn delay_for(&self, attempt: u32, err: &SyncError) -> Option<Duration> {
        if !err.retryable || attempt >= self.max_attempts {
            return None;
        }
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self
            .initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        if err.kind == SyncErrorKind::RateLimit {
            Some(backoff.max(self.rate_limit_backoff))
        } else {
            Some(backoff)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1000),
            rate_limit_backoff: Duration::from_millis(700),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let err = SyncError::new(SyncErrorKind::Network, "offline");
        let p = policy();
        assert_eq!(p.delay_for(1, &err), Some(Duration::from_millis(100)));
        assert_eq!(p.delay_for(2, &err), Some(Duration::from_millis(200)));
        assert_eq!(p.delay_for(3, &err), Some(Duration::from_millis(400)));
        assert_eq!(p.delay_for(4, &err), Some(Duration::from_millis(800)));
        assert_eq!(p.delay_for(5, &err), None);
    }

    #[test]
    fn cap_applies() {
        let err = SyncError::new(SyncErrorKind::Unknown, "500");
        let mut p = policy();
        p.max_attempts = 10;
        assert_eq!(p.delay_for(8, &err), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn rate_limit_has_floor() {
        let err = SyncError::new(SyncErrorKind::RateLimit, "429");
        assert_eq!(policy().delay_for(1, &err), Some(Duration::from_millis(700)));
    }

    #[test]
    fn terminal_errors_do_not_retry() {
        let err = SyncError::new(SyncErrorKind::Permission, "403");
        assert_eq!(policy().delay_for(1, &err), None);
        assert_eq!(
            RetryPolicy::none().delay_for(1, &SyncError::new(SyncErrorKind::Network, "x")),
            None
        );
    }
}
