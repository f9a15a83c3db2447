use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff schedule for channel reconnects: `base * multiplier^attempt`,
/// capped at `max_delay_ms`, for at most `max_attempts` attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_max_delay_ms() -> u64 {
    15_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before reconnect attempt `attempt` (zero-based).
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let raw = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(raw.min(self.max_delay_ms as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 1_000);
        assert_eq!(policy.multiplier, 1.5);
        assert_eq!(policy.max_delay_ms, 15_000);
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let policy: RetryPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, RetryPolicy::default());

        let policy: RetryPolicy = serde_json::from_str(r#"{"maxAttempts": 2}"#).unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.base_delay_ms, 1_000);
    }

    #[test]
    fn test_delay_grows_by_multiplier() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(0), Duration::from_millis(1_000));
        assert_eq!(policy.next_delay(1), Duration::from_millis(1_500));
        assert_eq!(policy.next_delay(2), Duration::from_millis(2_250));
        assert_eq!(policy.next_delay(3), Duration::from_millis(3_375));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(10), Duration::from_millis(15_000));
        assert_eq!(policy.next_delay(100), Duration::from_millis(15_000));
    }
}
