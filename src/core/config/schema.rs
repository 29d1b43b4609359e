//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing: numeric settings must be
//! positive and the base URL must be an absolute http(s) URL.
//!
//! # Credentials
//!
//! There is no field for the personal access token. Unknown
//! keys are rejected, so a `pat = "..."` line makes the file fail to load
//! instead of being silently persisted.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::{RefKind, RefSpec};

/// Top-level configuration file.
///
/// # Example
///
/// ```toml
/// [connection]
/// organization = "contoso"
/// project = "Mobile"
/// base_url = "http://tfs.local:8080/tfs"
///
/// [network]
/// timeout_secs = 60
/// max_attempts = 3
/// backoff_secs = 2
/// workers = 4
///
/// [source]
/// kind = "branch"
/// value = "develop"
///
/// [target]
/// kind = "tag_pattern"
/// value = "prod*"
///
/// [selection]
/// repositories = ["alpha", "beta"]
/// hide_aligned = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GitsnapConfig {
    /// Where and as whom to connect
    pub connection: Option<ConnectionConfig>,

    /// Timeouts, retries and concurrency
    pub network: Option<NetworkConfig>,

    /// Default SOURCE reference
    pub source: Option<RefSpec>,

    /// Default TARGET reference
    pub target: Option<RefSpec>,

    /// Default repository selection
    pub selection: Option<SelectionConfig>,
}

impl GitsnapConfig {
    /// Starting point written by `config init`.
    pub fn example(organization: &str, project: &str) -> Self {
        Self {
            connection: Some(ConnectionConfig {
                organization: Some(organization.to_string()),
                project: Some(project.to_string()),
                ..Default::default()
            }),
            network: Some(NetworkConfig::default()),
            source: Some(RefSpec::new(RefKind::Branch, "develop")),
            target: Some(RefSpec::new(RefKind::Branch, "master")),
            selection: None,
        }
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(connection) = &self.connection {
            connection.validate()?;
        }
        if let Some(network) = &self.network {
            network.validate()?;
        }
        if let Some(selection) = &self.selection {
            selection.validate()?;
        }
        Ok(())
    }
}

/// Connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Organization (cloud) or collection (on-premises)
    pub organization: Option<String>,

    /// Project name
    pub project: Option<String>,

    /// Server URL for on-premises installations
    pub base_url: Option<String>,

    /// Username for basic auth (optional)
    pub username: Option<String>,
}

impl ConnectionConfig {
    /// Validate the connection settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("organization", &self.organization),
            ("project", &self.project),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(format!(
                    "connection.{key} cannot be empty"
                )));
            }
        }

        if let Some(base_url) = &self.base_url {
            let parsed = Url::parse(base_url.trim()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid base_url '{}': {}", base_url, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid base_url '{}': scheme must be http or https",
                    base_url
                )));
            }
        }

        Ok(())
    }
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Attempts per request on network failures
    pub max_attempts: u32,

    /// Delay before the first retry, in seconds; doubles on each retry
    pub backoff_secs: u64,

    /// Repositories compared concurrently
    pub workers: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_attempts: 3,
            backoff_secs: 2,
            workers: 4,
        }
    }
}

impl NetworkConfig {
    /// Validate the network settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "network.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "network.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue(
                "network.workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Repository selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionConfig {
    /// Repository names or ids; empty means every repository
    pub repositories: Option<Vec<String>>,

    /// Hide aligned repositories (divergent and failed ones stay)
    #[serde(alias = "only_divergent")]
    pub hide_aligned: Option<bool>,
}

impl SelectionConfig {
    /// Validate the selection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(repos) = &self.repositories {
            if repos.iter().any(|r| r.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(
                    "selection.repositories cannot contain empty names".to_string(),
                ));
            }
        }
        Ok(())
    }
}
