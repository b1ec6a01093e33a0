//! Repository configuration with fail-fast validation

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::traits::Login;
use crate::types::{RepositoryError, RepositoryResult};

/// Settings required to reach the legacy data store.
///
/// All three settings are mandatory; a missing credential or a data
/// directory that does not exist on disk is a fatal configuration error
/// surfaced before any load is attempted, never a runtime fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub data_dir: PathBuf,
    pub username: String,
    pub password: String,
}

impl RepositoryConfig {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> RepositoryResult<()> {
        if self.username.trim().is_empty() {
            return Err(RepositoryError::Configuration(
                "username must not be empty".to_string(),
            ));
        }
        if self.password.trim().is_empty() {
            return Err(RepositoryError::Configuration(
                "password must not be empty".to_string(),
            ));
        }
        if !self.data_dir.is_dir() {
            return Err(RepositoryError::Configuration(format!(
                "data directory '{}' does not exist",
                self.data_dir.display()
            )));
        }
        Ok(())
    }

    pub fn login(&self) -> Login {
        Login {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// Full path of a named table file inside the data directory.
    pub fn table_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_configuration_passes() {
        let dir = tempfile::tempdir().unwrap();
        let config = RepositoryConfig::new(dir.path(), "clerk", "secret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_data_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        let config = RepositoryConfig::new(gone, "clerk", "secret");
        assert!(matches!(
            config.validate(),
            Err(RepositoryError::Configuration(_))
        ));
    }

    #[test]
    fn empty_credentials_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let no_user = RepositoryConfig::new(dir.path(), "", "secret");
        let no_pass = RepositoryConfig::new(dir.path(), "clerk", "  ");
        assert!(no_user.validate().is_err());
        assert!(no_pass.validate().is_err());
    }

    #[test]
    fn deserializes_from_host_config() {
        let dir = tempfile::tempdir().unwrap();
        let raw = format!(
            r#"{{"data_dir": "{}", "username": "clerk", "password": "secret"}}"#,
            dir.path().display()
        );
        let config: RepositoryConfig = serde_json::from_str(&raw).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.login().username, "clerk");
    }
}
