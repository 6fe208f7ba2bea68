use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mcm_access::LockConfig;

use crate::error::{ManagerError, ManagerResult};

/// Project-wide settings.
///
/// ```toml
/// [concurrency]
/// max_attempts = 20
/// attempt_interval_ms = 100
///
/// [input]
/// max_attempts = 5
/// attempt_interval_ms = 50
/// ```
///
/// Missing tables fall back to [`LockConfig::default`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Retry budget of every manager's data lock.
    pub concurrency: LockConfig,
    /// Retry budget of the project input lock.
    pub input: LockConfig,
}

impl ProjectSettings {
    /// Fast budgets for both locks.
    pub fn fast() -> Self {
        Self {
            concurrency: LockConfig::fast(),
            input: LockConfig::fast(),
        }
    }

    pub fn validate(&self) -> ManagerResult<()> {
        self.concurrency
            .validate()
            .map_err(|e| ManagerError::Config(format!("[concurrency] {e}")))?;
        self.input
            .validate()
            .map_err(|e| ManagerError::Config(format!("[input] {e}")))?;
        Ok(())
    }

    /// Parse and validate settings from TOML.
    pub fn from_toml_str(source: &str) -> ManagerResult<Self> {
        let settings: Self =
            toml::from_str(source).map_err(|e| ManagerError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ManagerResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ManagerError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "loading project settings");
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> ManagerResult<String> {
        toml::to_string(self).map_err(|e| ManagerError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults_match_lock_defaults() {
        let settings = ProjectSettings::default();
        assert_eq!(settings.concurrency.max_attempts, 20);
        assert_eq!(settings.input.attempt_interval, Duration::from_millis(100));
    }

    #[test]
    fn parse_partial_toml() {
        let settings = ProjectSettings::from_toml_str(
            "[input]\nmax_attempts = 3\nattempt_interval_ms = 10\n",
        )
        .unwrap();
        assert_eq!(settings.input.max_attempts, 3);
        assert_eq!(settings.input.attempt_interval, Duration::from_millis(10));
        assert_eq!(settings.concurrency, LockConfig::default());
    }

    #[test]
    fn invalid_budget_rejected() {
        let err = ProjectSettings::from_toml_str(
            "[concurrency]\nmax_attempts = 0\nattempt_interval_ms = 10\n",
        )
        .unwrap_err();
        assert!(matches!(err, ManagerError::Config(ref m) if m.starts_with("[concurrency]")));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let written = ProjectSettings::fast().to_toml_string().unwrap();
        file.write_all(written.as_bytes()).unwrap();

        let loaded = ProjectSettings::load(file.path()).unwrap();
        assert_eq!(loaded, ProjectSettings::fast());
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectSettings::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ManagerError::Config(_)));
    }
}
