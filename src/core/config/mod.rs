//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Environment (`GITSNAP_PAT` for the token)
//! 4. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order, first existing file wins:
//! 1. `--config <path>` (must exist)
//! 2. `$GITSNAP_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/gitsnap/config.toml`
//! 4. `~/.gitsnap/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use gitsnap::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! if let Some(org) = config.organization() {
//!     println!("Organization: {}", org);
//! }
//! println!("Workers: {}", config.workers());
//! ```

pub mod schema;

pub use schema::{ConnectionConfig, GitsnapConfig, NetworkConfig, SelectionConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::types::RefSpec;
use crate::forge::retry::RetryPolicy;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "GITSNAP_CONFIG";

/// Environment variable holding the personal access token.
pub const PAT_ENV: &str = "GITSNAP_PAT";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("config file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration with defaulting accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents (defaults when no file was found)
    pub file: GitsnapConfig,
    /// Path the configuration was loaded from
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `explicit` or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if `explicit` is missing, or if a config file
    /// exists but cannot be parsed or fails validation. A missing default
    /// config file is not an error (defaults are used).
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let candidates = search_paths(
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            dirs::home_dir(),
        );
        match candidates.into_iter().find(|p| p.exists()) {
            Some(path) => Self::load_file(&path),
            None => Ok(Config::default()),
        }
    }

    /// Load and validate one config file.
    pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: GitsnapConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        file.validate()?;

        Ok(Config {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    /// Get the canonical path for the config file.
    ///
    /// Returns `~/.gitsnap/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".gitsnap/config.toml"))
    }

    /// Write a config file atomically.
    ///
    /// Creates parent directories if needed. Refuses to replace an existing
    /// file unless `overwrite` is set.
    pub fn write(path: &Path, config: &GitsnapConfig, overwrite: bool) -> Result<(), ConfigError> {
        if path.exists() && !overwrite {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        config.validate()?;
        write_config_atomic(path, config)
    }

    /// Get the path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    fn connection(&self) -> Option<&ConnectionConfig> {
        self.file.connection.as_ref()
    }

    fn network(&self) -> NetworkConfig {
        self.file.network.clone().unwrap_or_default()
    }

    /// Get the organization, if configured.
    pub fn organization(&self) -> Option<&str> {
        self.connection().and_then(|c| c.organization.as_deref())
    }

    /// Get the project, if configured.
    pub fn project(&self) -> Option<&str> {
        self.connection().and_then(|c| c.project.as_deref())
    }

    /// Get the on-premises base URL, if configured.
    pub fn base_url(&self) -> Option<&str> {
        self.connection().and_then(|c| c.base_url.as_deref())
    }

    /// Get the basic-auth username, if configured.
    pub fn username(&self) -> Option<&str> {
        self.connection().and_then(|c| c.username.as_deref())
    }

    /// Per-request timeout. Defaults to 60 seconds.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.network().timeout_secs)
    }

    /// Retry policy for network failures. Defaults to 3 attempts, 2 s base.
    pub fn retry_policy(&self) -> RetryPolicy {
        let network = self.network();
        RetryPolicy::new(network.max_attempts, Duration::from_secs(network.backoff_secs))
    }

    /// Repositories compared concurrently. Defaults to 4.
    pub fn workers(&self) -> usize {
        self.network().workers.max(1)
    }

    /// Default SOURCE reference, if configured.
    pub fn source(&self) -> Option<&RefSpec> {
        self.file.source.as_ref()
    }

    /// Default TARGET reference, if configured.
    pub fn target(&self) -> Option<&RefSpec> {
        self.file.target.as_ref()
    }

    /// Default repository selection; empty means all.
    pub fn repositories(&self) -> &[String] {
        self.file
            .selection
            .as_ref()
            .and_then(|s| s.repositories.as_deref())
            .unwrap_or(&[])
    }

    /// Whether aligned repositories are hidden from the output.
    ///
    /// Defaults to `false` if not configured.
    pub fn hide_aligned(&self) -> bool {
        self.file
            .selection
            .as_ref()
            .and_then(|s| s.hide_aligned)
            .unwrap_or(false)
    }
}

/// Default config locations, in search order.
pub fn search_paths(
    env_config: Option<PathBuf>,
    xdg_config_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = env_config.filter(|p| !p.as_os_str().is_empty()) {
        paths.push(path);
    }
    if let Some(xdg) = xdg_config_home.filter(|p| !p.as_os_str().is_empty()) {
        paths.push(xdg.join("gitsnap/config.toml"));
    }
    if let Some(home) = home {
        paths.push(home.join(".gitsnap/config.toml"));
    }
    paths
}

/// Write a config file atomically (temp file in the same directory, then rename).
fn write_config_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    let temp_path = path.with_extension("toml.tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    file.write_all(contents.as_bytes())
        .map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

    file.sync_all().map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RefKind;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert!(config.organization().is_none());
        assert_eq!(config.workers(), 4);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.repositories().is_empty());
        assert!(!config.hide_aligned());
    }

    #[test]
    fn load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [connection]
            organization = "contoso"
            project = "Mobile"

            [network]
            max_attempts = 5
            backoff_secs = 1

            [source]
            kind = "tag_pattern"
            value = "prod*"

            [selection]
            repositories = ["alpha", "beta"]
            hide_aligned = true
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.organization(), Some("contoso"));
        assert_eq!(config.project(), Some("Mobile"));
        assert_eq!(config.retry_policy().max_attempts, 5);
        assert_eq!(config.retry_policy().base_delay, Duration::from_secs(1));
        assert_eq!(config.source().unwrap().kind, RefKind::TagPattern);
        assert_eq!(config.repositories(), ["alpha", "beta"]);
        assert!(config.hide_aligned());
        assert_eq!(config.loaded_from(), Some(path.as_path()));
    }

    #[test]
    fn only_divergent_key_still_accepted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[selection]\nonly_divergent = true\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(config.hide_aligned());
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(Some(&temp.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "pat = \"secret\"\n").unwrap();

        let result = Config::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[network]\ntimeout_secs = 0\n").unwrap();

        let result = Config::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn search_order() {
        let paths = search_paths(
            Some(PathBuf::from("/etc/gitsnap.toml")),
            Some(PathBuf::from("/xdg")),
            Some(PathBuf::from("/home/u")),
        );
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/etc/gitsnap.toml"),
                PathBuf::from("/xdg/gitsnap/config.toml"),
                PathBuf::from("/home/u/.gitsnap/config.toml"),
            ]
        );
    }

    #[test]
    fn empty_env_values_ignored() {
        let paths = search_paths(Some(PathBuf::new()), Some(PathBuf::new()), None);
        assert!(paths.is_empty());
    }

    #[test]
    fn write_config_atomic_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");
        let config = GitsnapConfig::example("contoso", "Mobile");

        Config::write(&path, &config, false).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.file, config);
    }

    #[test]
    fn write_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "").unwrap();

        let config = GitsnapConfig::default();
        let result = Config::write(&path, &config, false);
        assert!(matches!(result, Err(ConfigError::AlreadyExists(_))));

        Config::write(&path, &config, true).unwrap();
    }
}
