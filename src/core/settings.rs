// src/core/settings.rs

use crate::{
    constants::{DEFAULT_LIFETIME_SECS, DEFAULT_REGION, SETTINGS_FILENAME},
    core::paths::{self, PathError},
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings file '{file}': {source}")]
    Parse {
        file: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Path error: {0}")]
    Path(#[from] PathError),
}

/// User settings read from `config.toml`. Every key is optional.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Directory of catalog files. Defaults to `<config>/catalogs`.
    pub catalog_dir: Option<String>,
    /// File-backed profile store. Defaults to `<config>/profiles.toml`.
    pub profiles_file: Option<String>,
    /// Session name for assumed roles. Defaults to `$USER`.
    pub session_name: Option<String>,
    pub lifetime_secs: u64,
    pub default_region: String,
    /// Selection prompt: `select` or `fuzzy`.
    pub prompt: String,
    /// The `aws` executable used for STS calls.
    pub aws_cli: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_dir: None,
            profiles_file: None,
            session_name: None,
            lifetime_secs: DEFAULT_LIFETIME_SECS,
            default_region: DEFAULT_REGION.to_string(),
            prompt: "select".to_string(),
            aws_cli: "aws".to_string(),
        }
    }
}

impl Settings {
    /// Loads `<config>/config.toml`, falling back to defaults if it is absent.
    pub fn load() -> Result<Self, SettingsError> {
        let path = paths::get_config_dir()?.join(SETTINGS_FILENAME);
        if !path.exists() {
            log::debug!("No settings file at '{}'; using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    pub fn from_toml_str(content: &str, file: &str) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|source| SettingsError::Parse {
            file: file.to_string(),
            source,
        })
    }

    pub fn catalog_dir(&self) -> Result<PathBuf, PathError> {
        match &self.catalog_dir {
            Some(template) => paths::expand_path(template),
            None => paths::default_catalog_dir(),
        }
    }

    pub fn profiles_file(&self) -> Result<PathBuf, PathError> {
        match &self.profiles_file {
            Some(template) => paths::expand_path(template),
            None => paths::default_profiles_file(),
        }
    }

    pub fn session_name(&self) -> String {
        self.session_name
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "wayfarer".to_string())
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}
