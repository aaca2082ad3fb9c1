// src/core/paths.rs

use crate::constants::{CATALOG_DIR_NAME, CONFIG_DIR_ENV, CONFIG_DIR_NAME, PROFILES_FILENAME};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

lazy_static! {
    static ref CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not create directory at '{path}': {source}")]
    DirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to expand path template '{template}': {message}")]
    Expansion { template: String, message: String },
}

/// Returns the wayfarer configuration directory (`$WAYFARER_CONFIG_DIR` or
/// `~/.config/wayfarer`). Creates it if it doesn't exist.
///
/// Memoized: the first call computes the path, later calls return the cached value.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    // 1. Serve the memoized value.
    let mut cached = CONFIG_DIR.lock();
    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    // 2. The environment override wins over the platform config dir.
    let config_path = match env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::config_dir()
            .ok_or(PathError::ConfigDirNotFound)?
            .join(CONFIG_DIR_NAME),
    };
    ensure_dir(&config_path)?;

    // 3. Remember it for the rest of the process.
    *cached = Some(config_path.clone());
    Ok(config_path)
}

/// Creates `path` (and its parents) if missing.
pub fn ensure_dir(path: &Path) -> Result<(), PathError> {
    if !path.exists() {
        log::debug!("Creating directory '{}'", path.display());
        fs::create_dir_all(path).map_err(|e| PathError::DirCreation {
            path: path.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// The default catalog directory (`<config>/catalogs`).
pub fn default_catalog_dir() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(CATALOG_DIR_NAME))
}

/// The default file-backed profile store (`<config>/profiles.toml`).
pub fn default_profiles_file() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(PROFILES_FILENAME))
}

/// Expands `~` and environment variables in a user-supplied path.
pub fn expand_path(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        message: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}
