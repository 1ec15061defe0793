//! Configuration file resolution, loading and atomic writes
//!
//! Resolution priority for the configuration file:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/cleanview/cleanview.toml`)
//! 4. Compiled defaults (no file)
//!
//! A missing file is never fatal: a warning is logged and defaults are used.
//! A file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "CLEANVIEW_CONFIG";

/// Configuration file name inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "cleanview.toml";

/// Logging section shared by every cleanview binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Where a resolved configuration path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    PlatformDefault,
}

/// Resolves the configuration file path following the priority order above
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env_var: String,
    platform_path: Option<PathBuf>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(CONFIG_ENV_VAR)
    }
}

impl ConfigResolver {
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            platform_path: dirs::config_dir().map(|d| d.join("cleanview").join(CONFIG_FILE_NAME)),
        }
    }

    /// Override the platform default location (tests, portable installs)
    pub fn with_platform_path(mut self, path: Option<PathBuf>) -> Self {
        self.platform_path = path;
        self
    }

    /// Resolve the configuration file path, or `None` when only compiled
    /// defaults apply.
    ///
    /// CLI and environment paths are returned even if the file is missing so
    /// that the loader can warn about them; the platform default is only
    /// returned when it exists.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
        if let Some(path) = cli_arg {
            return Some((path.to_path_buf(), ConfigSource::CommandLine));
        }

        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.trim().is_empty() {
                return Some((PathBuf::from(path), ConfigSource::Environment));
            }
        }

        match &self.platform_path {
            Some(path) if path.exists() => Some((path.clone(), ConfigSource::PlatformDefault)),
            _ => None,
        }
    }
}

/// Load a TOML configuration, falling back to `T::default()` when no file
/// is given or the file does not exist.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        debug!("No configuration file; using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Configuration file {} not found; using compiled defaults",
            path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<T>(&content).map_err(|e| {
        Error::Config(format!("Invalid configuration file {}: {}", path.display(), e))
    })?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Serialize a configuration to TOML and write it atomically
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    write_atomic(path, content.as_bytes())
}

/// Write a file atomically: write to `<path>.tmp`, flush, then rename.
///
/// A crash mid-write leaves either the old file or the new one, never a
/// truncated mix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let write_result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }

    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        Error::Io(e)
    })
}
