//! Configuration loader with dual-location support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.rally/rally.toml
//! 3. Project-level config: ./.rally/rally.toml
//! 4. `RALLY_URL` / `RALLY_ANON_KEY` environment overrides
//!
//! Later sources override earlier ones.

use crate::config::schema::RallyConfig;
use crate::error::{RallyError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const CONFIG_DIR: &str = ".rally";
const CONFIG_FILE: &str = "rally.toml";

/// Configuration loader that handles both user and project configs
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE)),
            project_config_path: PathBuf::from(CONFIG_DIR).join(CONFIG_FILE),
        }
    }

    /// Create a loader reading from explicit locations
    pub fn with_paths(user: Option<PathBuf>, project: PathBuf) -> Self {
        Self {
            user_config_path: user,
            project_config_path: project,
        }
    }

    /// Load configuration with project taking precedence over user
    pub async fn load(&self) -> Result<RallyConfig> {
        let mut config = RallyConfig::default();
        debug!("Loading configuration with defaults");

        if let Some(user_path) = &self.user_config_path {
            match Self::load_from_path(user_path).await {
                Ok(user_config) => {
                    debug!(path = %user_path.display(), "Loaded user-level config");
                    config.merge(user_config);
                }
                Err(e) => {
                    debug!(
                        path = %user_path.display(),
                        error = %e,
                        "User-level config not loaded, using defaults"
                    );
                }
            }
        }

        match Self::load_from_path(&self.project_config_path).await {
            Ok(project_config) => {
                debug!(path = %self.project_config_path.display(), "Loaded project-level config");
                config.merge(project_config);
            }
            Err(e) => {
                debug!(
                    path = %self.project_config_path.display(),
                    error = %e,
                    "Project-level config not loaded"
                );
            }
        }

        config.resolve_env_vars();
        config.apply_env_overrides();

        info!(backend = %config.backend.url, "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a specific path
    pub async fn load_from_path(path: &Path) -> Result<RallyConfig> {
        if !path.exists() {
            return Err(RallyError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| RallyError::Config(format!("Failed to read config: {}", e)))?;

        let config: RallyConfig = toml::from_str(&content)
            .map_err(|e| RallyError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Write a default user-level config file unless one already exists
    ///
    /// Returns the path written, or the existing path untouched.
    pub async fn write_default(&self) -> Result<PathBuf> {
        let path = self
            .user_config_path
            .clone()
            .ok_or_else(|| RallyError::Config("No home directory for user config".to_string()))?;

        if path.exists() {
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(&RallyConfig::default())
            .map_err(|e| RallyError::Config(format!("Failed to render config: {}", e)))?;
        fs::write(&path, content).await?;

        info!(path = %path.display(), "Wrote default config");
        Ok(path)
    }

    pub fn user_config_path(&self) -> Option<&PathBuf> {
        self.user_config_path.as_ref()
    }

    pub fn project_config_path(&self) -> &PathBuf {
        &self.project_config_path
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
