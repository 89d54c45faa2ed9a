//! Configuration for modforge.
//!
//! Uses figment for layered configuration with provenance tracking:
//! defaults <- user config (`<config dir>/modforge/config.toml`)
//! <- project `.modforge.toml` <- `MODFORGE_*` environment variables.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the project-level config file
pub const CONFIG_FILE_NAME: &str = ".modforge.toml";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "MODFORGE_";

/// modforge configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Author credited in generated headers when the descriptor names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Replace existing files by default (default: false).
    #[serde(default)]
    pub overwrite: bool,
}

/// Path of the per-user config file, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("modforge").join("config.toml"))
}

impl Config {
    /// Load configuration for a project rooted at `root`.
    ///
    /// Returns defaults if no config files exist. Parse errors are reported
    /// with file and key information, and defaults are used instead.
    pub fn load(root: &Path) -> Self {
        Self::load_from(user_config_path().as_deref(), root)
    }

    /// Load configuration with an explicit user config file.
    pub fn load_from(user_config: Option<&Path>, root: &Path) -> Self {
        let project_config = root.join(CONFIG_FILE_NAME);

        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        // Only add TOML providers for files that exist
        if let Some(user_config) = user_config.filter(|p| p.exists()) {
            figment = figment.merge(Toml::file(user_config));
        }
        if project_config.exists() {
            figment = figment.merge(Toml::file(&project_config));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        match figment.extract() {
            Ok(config) => {
                if project_config.exists() {
                    tracing::info!("Loaded config from {:?}", project_config);
                }
                config
            }
            Err(e) => {
                tracing::warn!("Config error: {}", e);
                Self::default()
            }
        }
    }
}
