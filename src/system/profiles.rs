//! # Profile Stores
//!
//! Long-lived credentials are looked up by profile label through the
//! [`ProfileStore`] trait. Backends that can persist credentials also expose
//! [`WritableStore`] through [`ProfileStore::as_writable`], which is how the
//! [`MultiStore`] chain writes a credential found late in the chain forward
//! into an earlier backend.

use crate::{core::catalog_loader::write_private, core::paths, models::Credentials};
use dialoguer::{Error as DialoguerError, Input, Password, theme::ColorfulTheme};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse profile file '{file}': {source}")]
    Parse {
        file: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize profiles: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Path error: {0}")]
    Path(#[from] paths::PathError),
    #[error("User Interface Error: {0}")]
    Dialoguer(#[from] DialoguerError),
    #[error("Profile '{0}' not found.")]
    NotFound(String),
    #[error("No profile store is writable.")]
    NotWritable,
}

/// Read access to long-lived credentials keyed by profile label.
pub trait ProfileStore: Send + Sync + fmt::Debug {
    fn lookup(&self, profile: &str) -> Result<Credentials, StoreError>;

    /// True if the store holds the profile without having to ask anyone.
    fn check(&self, profile: &str) -> bool;

    fn delete(&self, profile: &str) -> Result<(), StoreError>;

    /// The writable side of this store, if it has one.
    fn as_writable(&self) -> Option<&dyn WritableStore> {
        None
    }
}

pub trait WritableStore: Send + Sync + fmt::Debug {
    fn write(&self, profile: &str, credentials: &Credentials) -> Result<(), StoreError>;
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
struct StoredProfile {
    access_key_id: String,
    secret_access_key: String,
}

/// Profiles kept in a TOML file readable only by the owner:
///
/// ```toml
/// [work]
/// access_key_id = "AKIA..."
/// secret_access_key = "..."
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, StoredProfile>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|source| StoreError::Parse {
            file: self.path.display().to_string(),
            source,
        })
    }

    fn write_all(&self, profiles: &BTreeMap<String, StoredProfile>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            paths::ensure_dir(parent)?;
        }
        write_private(&self.path, &toml::to_string_pretty(profiles)?)?;
        Ok(())
    }
}

impl ProfileStore for FileStore {
    fn lookup(&self, profile: &str) -> Result<Credentials, StoreError> {
        let stored = self
            .read_all()?
            .remove(profile)
            .ok_or_else(|| StoreError::NotFound(profile.to_string()))?;
        Ok(Credentials::long_lived(stored.access_key_id, stored.secret_access_key))
    }

    fn check(&self, profile: &str) -> bool {
        match self.read_all() {
            Ok(profiles) => profiles.contains_key(profile),
            Err(e) => {
                log::warn!("Could not read '{}': {}", self.path.display(), e);
                false
            }
        }
    }

    fn delete(&self, profile: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut profiles = self.read_all()?;
        if profiles.remove(profile).is_none() {
            return Err(StoreError::NotFound(profile.to_string()));
        }
        self.write_all(&profiles)
    }

    fn as_writable(&self) -> Option<&dyn WritableStore> {
        Some(self)
    }
}

impl WritableStore for FileStore {
    fn write(&self, profile: &str, credentials: &Credentials) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut profiles = self.read_all()?;
        profiles.insert(
            profile.to_string(),
            StoredProfile {
                access_key_id: credentials.access_key_id.clone(),
                secret_access_key: credentials.secret_access_key.clone(),
            },
        );
        self.write_all(&profiles)?;
        log::info!("Stored profile '{}' in '{}'", profile, self.path.display());
        Ok(())
    }
}

/// Asks for the access key pair on the terminal. Prompts are serialized so
/// concurrent workers never interleave their questions.
#[derive(Debug, Default)]
pub struct PromptStore {
    prompt_lock: Mutex<()>,
}

impl ProfileStore for PromptStore {
    fn lookup(&self, profile: &str) -> Result<Credentials, StoreError> {
        let _guard = self.prompt_lock.lock();
        let theme = ColorfulTheme::default();
        let access_key_id: String = Input::with_theme(&theme)
            .with_prompt(format!("Access key id for '{}'", profile))
            .interact_text()?;
        let secret_access_key = Password::with_theme(&theme)
            .with_prompt(format!("Secret access key for '{}'", profile))
            .interact()?;
        Ok(Credentials::long_lived(access_key_id.trim(), secret_access_key.trim()))
    }

    fn check(&self, _profile: &str) -> bool {
        false
    }

    fn delete(&self, _profile: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

/// An ordered chain of stores. Lookups return the first hit; a hit in a later
/// backend is written forward into the earliest writable backend before it.
#[derive(Debug, Default)]
pub struct MultiStore {
    backends: Vec<Box<dyn ProfileStore>>,
}

impl MultiStore {
    pub fn new(backends: Vec<Box<dyn ProfileStore>>) -> Self {
        Self { backends }
    }

    /// `[FileStore, PromptStore]`.
    pub fn default_chain(profiles_file: impl Into<PathBuf>) -> Self {
        Self::new(vec![
            Box::new(FileStore::new(profiles_file)),
            Box::new(PromptStore::default()),
        ])
    }

    fn write_forward(
        &self,
        found_at: usize,
        profile: &str,
        credentials: &Credentials,
    ) -> Result<(), StoreError> {
        let target = self
            .backends
            .iter()
            .take(found_at)
            .find_map(|b| b.as_writable());
        match target {
            Some(store) => store.write(profile, credentials),
            None => Ok(()),
        }
    }
}

impl ProfileStore for MultiStore {
    fn lookup(&self, profile: &str) -> Result<Credentials, StoreError> {
        let mut last_err = StoreError::NotFound(profile.to_string());
        for (index, backend) in self.backends.iter().enumerate() {
            match backend.lookup(profile) {
                Ok(credentials) => {
                    if index > 0 {
                        self.write_forward(index, profile, &credentials)?;
                    }
                    return Ok(credentials);
                }
                Err(e) => {
                    log::debug!("Profile '{}' not in {:?}: {}", profile, backend, e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn check(&self, profile: &str) -> bool {
        self.backends.iter().any(|b| b.check(profile))
    }

    fn delete(&self, profile: &str) -> Result<(), StoreError> {
        let mut deleted = false;
        let mut first_err = None;
        for backend in &self.backends {
            match backend.delete(profile) {
                Ok(()) => deleted = true,
                Err(StoreError::NotFound(_)) => {}
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None if deleted => Ok(()),
            None => Err(StoreError::NotFound(profile.to_string())),
        }
    }

    fn as_writable(&self) -> Option<&dyn WritableStore> {
        self.backends.iter().find_map(|b| b.as_writable())
    }
}
