//! # Hop Credential Cache
//!
//! Credentials produced by a hop are cached under the hop's identity key so a
//! later traversal through the same hop can skip the external call. Entries are
//! only served after a liveness probe succeeds; a failed probe evicts them.
//!
//! [`HopLocks`] is the keyed lock registry that serializes concurrent
//! traversals of the same hop. It belongs to one run, not to the process.

use crate::{
    core::path::Hop,
    models::Credentials,
    system::sts::RoleAssumer,
};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend failure for '{key}': {message}")]
    Backend { key: String, message: String },
}

/// Storage for per-hop credentials.
pub trait CredentialCache: Send + Sync + fmt::Debug {
    fn get(&self, hop: &Hop) -> Option<Credentials>;
    fn put(&self, hop: &Hop, credentials: &Credentials) -> Result<(), CacheError>;
    fn delete(&self, hop: &Hop) -> Result<(), CacheError>;
}

/// A cache that never holds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl CredentialCache for NullCache {
    fn get(&self, _hop: &Hop) -> Option<Credentials> {
        None
    }

    fn put(&self, _hop: &Hop, _credentials: &Credentials) -> Result<(), CacheError> {
        Ok(())
    }

    fn delete(&self, _hop: &Hop) -> Result<(), CacheError> {
        Ok(())
    }
}

/// An in-memory cache keyed by hop identity.
#[derive(Debug, Default)]
pub struct MapCache {
    entries: DashMap<String, Credentials>,
}

impl MapCache {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialCache for MapCache {
    fn get(&self, hop: &Hop) -> Option<Credentials> {
        self.entries.get(&hop.key()).map(|entry| entry.value().clone())
    }

    fn put(&self, hop: &Hop, credentials: &Credentials) -> Result<(), CacheError> {
        self.entries.insert(hop.key(), credentials.clone());
        Ok(())
    }

    fn delete(&self, hop: &Hop) -> Result<(), CacheError> {
        self.entries.remove(&hop.key());
        Ok(())
    }
}

/// Returns the cached credentials for `hop` only if they are still accepted.
///
/// An entry whose expiration has passed is evicted without a probe. Otherwise
/// the entry is probed through `assumer`; a failed probe evicts it. Either way
/// a miss is reported and the caller acquires fresh credentials.
pub fn check_cache(
    cache: &dyn CredentialCache,
    assumer: &dyn RoleAssumer,
    hop: &Hop,
) -> Result<Option<Credentials>, CacheError> {
    let Some(credentials) = cache.get(hop) else {
        log::trace!("Cache miss for hop '{}'", hop.key());
        return Ok(None);
    };

    if credentials.is_expired(Utc::now()) {
        log::debug!("Cached credentials for '{}' expired; evicting", hop.key());
        cache.delete(hop)?;
        return Ok(None);
    }

    match assumer.check_identity(&credentials) {
        Ok(identity) => {
            log::debug!("Cache hit for '{}' ({})", hop.key(), identity.arn);
            Ok(Some(credentials))
        }
        Err(e) => {
            log::info!("Cached credentials for '{}' rejected ({}); evicting", hop.key(), e);
            cache.delete(hop)?;
            Ok(None)
        }
    }
}

/// One mutex per hop identity, created on first use.
#[derive(Debug, Default)]
pub struct HopLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl HopLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `key`. Callers hold `lock()` on the result for the
    /// whole check-acquire-store sequence.
    pub fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}
