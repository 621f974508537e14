use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::RetryPolicy;

/// Who may touch a project besides its owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessPolicy {
    /// Only `project.owner_id` can read or write
    #[default]
    OwnerOnly,
    /// Owner, plus collaborators according to their role
    OwnerOrCollaborator,
}

impl AccessPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessPolicy::OwnerOnly => "owner-only",
            AccessPolicy::OwnerOrCollaborator => "owner-or-collaborator",
        }
    }
}

impl FromStr for AccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner-only" | "owner" => Ok(AccessPolicy::OwnerOnly),
            "owner-or-collaborator" | "collaborators" => Ok(AccessPolicy::OwnerOrCollaborator),
            other => Err(format!("Invalid access policy: {}", other)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Engine settings, read from an optional TOML file and then from
/// `SCHEMACANVAS_*` environment variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database_url: String,
    pub access_policy: AccessPolicy,
    pub store_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_snapshot_bytes: usize,
    /// Identity the operator binary acts as
    pub actor: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://schemacanvas.db?mode=rwc".to_string(),
            access_policy: AccessPolicy::OwnerOnly,
            store_retries: 2,
            retry_backoff_ms: 20,
            max_snapshot_bytes: 8 * 1024 * 1024,
            actor: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load the optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&contents)?
            }
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `SCHEMACANVAS_*` overrides from `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SCHEMACANVAS_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(policy) = lookup("SCHEMACANVAS_ACCESS_POLICY") {
            self.access_policy = policy
                .parse()
                .map_err(|_| invalid("SCHEMACANVAS_ACCESS_POLICY", &policy))?;
        }
        if let Some(retries) = lookup("SCHEMACANVAS_STORE_RETRIES") {
            self.store_retries = retries
                .trim()
                .parse()
                .map_err(|_| invalid("SCHEMACANVAS_STORE_RETRIES", &retries))?;
        }
        if let Some(bytes) = lookup("SCHEMACANVAS_MAX_SNAPSHOT_BYTES") {
            self.max_snapshot_bytes = bytes
                .trim()
                .parse()
                .map_err(|_| invalid("SCHEMACANVAS_MAX_SNAPSHOT_BYTES", &bytes))?;
        }
        if let Some(actor) = lookup("SCHEMACANVAS_ACTOR") {
            self.actor = Some(actor);
        }
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.store_retries,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.access_policy, AccessPolicy::OwnerOnly);
        assert_eq!(config.store_retries, 2);
        assert!(config.actor.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
database_url = "sqlite::memory:"
access_policy = "owner-or-collaborator"
store_retries = 5
"#,
        )
        .expect("valid config");

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.access_policy, AccessPolicy::OwnerOrCollaborator);
        assert_eq!(config.store_retries, 5);
        assert_eq!(config.max_snapshot_bytes, EngineConfig::default().max_snapshot_bytes);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SCHEMACANVAS_ACCESS_POLICY", "collaborators"),
            ("SCHEMACANVAS_STORE_RETRIES", "7"),
            ("SCHEMACANVAS_ACTOR", "user-1"),
        ]);

        let config = EngineConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .expect("valid overrides");

        assert_eq!(config.access_policy, AccessPolicy::OwnerOrCollaborator);
        assert_eq!(config.store_retries, 7);
        assert_eq!(config.actor.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let result = EngineConfig::default().with_overrides(|key| {
            (key == "SCHEMACANVAS_STORE_RETRIES").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
