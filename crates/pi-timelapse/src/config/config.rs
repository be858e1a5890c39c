//! Configuration management for pi-timelapse.
//!
//! Handles loading and saving the TOML configuration file with
//! cross-platform paths and atomic write operations.

use crate::{
    AppError, AppResult,
    config::{CONFIG_PATH_ENV, LoggingConfig},
};

use std::{
    fs,
    io::Write,
    panic::Location,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use error_location::ErrorLocation;
use pi_timelapse_core::Settings;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Main configuration struct.
///
/// The core's sections (`[storage]`, `[capture]`, `[encode]`,
/// `[live_view]`, `[scheduler]`) sit at the top level next to `[logging]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Log filtering and file output.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Settings handed to the timelapse core.
    #[serde(flatten)]
    pub core: Settings,
}

impl Config {
    /// Load configuration from disk, creating default if not found.
    #[track_caller]
    #[instrument]
    pub fn load() -> AppResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let config = Self::load_from(&config_path)?;
            info!(config_path = ?config_path, "Configuration loaded");
            Ok(config)
        } else {
            info!(config_path = ?config_path, "No config found, creating default");
            Self::create_default(&config_path)
        }
    }

    /// Read and parse the config file at `path`.
    #[track_caller]
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to read config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        toml::from_str(&contents).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Save configuration to `path` using atomic write pattern.
    ///
    /// Writes to a temporary file first, then renames to prevent corruption
    /// if the process crashes during the write.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        let contents = toml::to_string_pretty(self).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
                debug!(config_dir = ?parent, "Created config directory");
            }
        }

        // Atomic write: write to temp file then rename
        let temp_path = path.with_extension("toml.tmp");

        let mut temp_file = fs::File::create(&temp_path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to create temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| AppError::ConfigError {
                reason: format!("Failed to write temp config file: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        temp_file.sync_all().map_err(|e| AppError::ConfigError {
            reason: format!("Failed to sync temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        fs::rename(&temp_path, path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to rename temp config to final: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(config_path = ?path, "Configuration saved (atomic write)");

        Ok(())
    }

    /// `PI_TIMELAPSE_CONFIG` if set, else `config.toml` in the platform config dir.
    #[track_caller]
    pub fn config_path() -> AppResult<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let proj_dirs = Self::project_dirs()?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    #[track_caller]
    fn project_dirs() -> AppResult<ProjectDirs> {
        ProjectDirs::from("com", "pi-timelapse", "Pi-Timelapse").ok_or_else(|| {
            AppError::ConfigError {
                reason: "Failed to get project directories".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }
        })
    }

    /// Defaults with the data directory under the platform data dir.
    #[track_caller]
    fn create_default(path: &Path) -> AppResult<Self> {
        let mut config = Config::default();
        config.core.storage.data_dir = Self::project_dirs()?.data_dir().to_path_buf();

        config.save_to(path)?;

        info!(
            data_dir = ?config.core.storage.data_dir,
            "Default config created"
        );

        Ok(config)
    }
}
