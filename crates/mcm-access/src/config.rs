use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, AccessResult};

/// Retry budget of an [`AccessLockSource`](crate::AccessLockSource).
///
/// An acquisition tries once, then retries up to `max_attempts` times with
/// `attempt_interval` of sleep before each retry. The worst-case wait is
/// therefore about `max_attempts * attempt_interval`.
///
/// Serialized with the interval in milliseconds:
///
/// ```toml
/// max_attempts = 20
/// attempt_interval_ms = 100
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    pub max_attempts: u32,
    #[serde(rename = "attempt_interval_ms", with = "millis")]
    pub attempt_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            attempt_interval: Duration::from_millis(100),
        }
    }
}

impl LockConfig {
    pub fn new(max_attempts: u32, attempt_interval: Duration) -> Self {
        Self {
            max_attempts,
            attempt_interval,
        }
    }

    /// A short budget for tests and interactive callers.
    pub fn fast() -> Self {
        Self::new(5, Duration::from_millis(2))
    }

    /// The worst-case time spent sleeping before a timeout. Saturates at
    /// [`Duration::MAX`].
    pub fn max_wait(&self) -> Duration {
        self.attempt_interval
            .checked_mul(self.max_attempts)
            .unwrap_or(Duration::MAX)
    }

    /// Reject budgets that could never wait: zero attempts or a zero interval.
    pub fn validate(&self) -> AccessResult<()> {
        if self.max_attempts == 0 {
            return Err(AccessError::InvalidConfig(
                "max_attempts must be positive".into(),
            ));
        }
        if self.attempt_interval.is_zero() {
            return Err(AccessError::InvalidConfig(
                "attempt_interval must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a configuration from a TOML table.
    pub fn from_toml_str(source: &str) -> AccessResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| AccessError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = LockConfig::default();
        assert_eq!(c.max_attempts, 20);
        assert_eq!(c.attempt_interval, Duration::from_millis(100));
        assert_eq!(c.max_wait(), Duration::from_secs(2));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn parse_from_toml() {
        let c = LockConfig::from_toml_str("max_attempts = 3\nattempt_interval_ms = 100\n").unwrap();
        assert_eq!(c, LockConfig::new(3, Duration::from_millis(100)));
        assert_eq!(c.max_wait(), Duration::from_millis(300));
    }

    #[test]
    fn toml_roundtrip() {
        let c = LockConfig::new(7, Duration::from_millis(15));
        let text = toml::to_string(&c).unwrap();
        assert!(text.contains("attempt_interval_ms = 15"));
        assert_eq!(LockConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = LockConfig::from_toml_str("max_attempts = 0\nattempt_interval_ms = 10\n")
            .unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn zero_interval_rejected() {
        let c = LockConfig::new(3, Duration::ZERO);
        assert!(c.validate().is_err());
    }

    #[test]
    fn huge_budget_saturates() {
        let c = LockConfig::new(u32::MAX, Duration::from_secs(u64::MAX / 2));
        assert_eq!(c.max_wait(), Duration::MAX);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(LockConfig::from_toml_str("max_attempts = \"many\"").is_err());
    }
}
