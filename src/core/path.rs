//! # Paths and Hops
//!
//! A [`Path`] is an ordered chain of [`Hop`]s, origin first. Traversing a path
//! turns the origin profile into long-lived credentials and then feeds each
//! hop's output into the next role assumption.
//!
//! Every hop runs under the [`HopLocks`] entry for its identity key and goes
//! through the shared cache, so concurrent traversals that share a hop make at
//! most one external call for it.

use crate::{
    constants::{DEFAULT_LIFETIME_SECS, DEFAULT_REGION},
    core::hop_cache::{self, CacheError, CredentialCache, HopLocks, MapCache},
    models::{Account, Credentials},
    system::{
        mfa::{MfaError, MfaPrompt},
        profiles::{ProfileStore, StoreError},
        sts::{self, AssumeError, AssumeRoleRequest, MfaProof, RoleAssumer},
    },
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraverseError {
    #[error("Cannot traverse an empty path.")]
    EmptyPath,
    #[error("Hop '{0}' has no source credentials to assume from.")]
    MissingSource(String),
    #[error("Profile store error: {0}")]
    Store(#[from] StoreError),
    #[error("Role assumption failed: {0}")]
    Assume(#[from] AssumeError),
    #[error("MFA error: {0}")]
    Mfa(#[from] MfaError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// One link in a credential chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hop {
    /// Long-lived credentials read from the profile store.
    Origin { profile: String },
    /// A role assumption in `account`.
    Assume {
        account: Account,
        role: String,
        mfa: bool,
    },
}

impl Hop {
    pub fn origin(profile: impl Into<String>) -> Self {
        Self::Origin {
            profile: profile.into(),
        }
    }

    pub fn assume(account: Account, role: impl Into<String>, mfa: bool) -> Self {
        Self::Assume {
            account,
            role: role.into(),
            mfa,
        }
    }

    /// The identity of the underlying acquisition. Hops with equal keys are
    /// interchangeable.
    pub fn key(&self) -> String {
        match self {
            Self::Origin { profile } => format!("profile--{}", profile),
            Self::Assume { account, role, mfa } => format!("{}-{}-{}", account.id, role, mfa),
        }
    }

    /// Produces this hop's credentials from `source` (the previous hop's
    /// output, `None` for the origin).
    pub fn traverse(
        &self,
        source: Option<&Credentials>,
        options: &TraverseOptions,
    ) -> Result<Credentials, TraverseError> {
        // 1. One traversal per hop identity at a time.
        let key = self.key();
        let lock = options.locks.lock_for(&key);
        let _guard = lock.lock();

        // 2. Reuse live cached credentials.
        if let Some(cached) =
            hop_cache::check_cache(options.cache.as_ref(), options.assumer.as_ref(), self)?
        {
            return Ok(cached);
        }

        // 3. Fetch fresh ones.
        let credentials = match self {
            Self::Origin { profile } => {
                log::debug!("Reading profile '{}'", profile);
                options.store.lookup(profile)?
            }
            Self::Assume { account, role, mfa } => {
                let source = source.ok_or_else(|| TraverseError::MissingSource(key.clone()))?;
                let request = AssumeRoleRequest {
                    account_id: account.id.clone(),
                    role_name: role.clone(),
                    session_name: options.session_name.clone(),
                    lifetime: options.lifetime,
                    region: account
                        .region()
                        .unwrap_or(&options.default_region)
                        .to_string(),
                    mfa: if *mfa {
                        Some(options.mfa_proof(source)?)
                    } else {
                        None
                    },
                    policy: options.policy.clone(),
                };
                options.assumer.assume_role(source, &request)?
            }
        };

        options.cache.put(self, &credentials)?;
        Ok(credentials)
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Origin { profile } => write!(f, "profile:{}", profile),
            Self::Assume { account, role, mfa } => {
                write!(f, "{}/{}", account.id, role)?;
                if *mfa {
                    write!(f, " (mfa)")?;
                }
                Ok(())
            }
        }
    }
}

/// A chain of hops in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path(Vec<Hop>);

impl Path {
    pub fn new(hops: Vec<Hop>) -> Self {
        Self(hops)
    }

    pub fn hops(&self) -> &[Hop] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, hop: Hop) {
        self.0.push(hop);
    }

    /// The profile label of the first hop, if it is an origin.
    pub fn origin_profile(&self) -> Option<&str> {
        match self.0.first() {
            Some(Hop::Origin { profile }) => Some(profile),
            _ => None,
        }
    }

    fn target(&self) -> Option<(&Account, &str)> {
        match self.0.last() {
            Some(Hop::Assume { account, role, .. }) => Some((account, role)),
            _ => None,
        }
    }

    /// The role assumed by the last hop.
    pub fn target_role(&self) -> Option<&str> {
        self.target().map(|(_, role)| role)
    }

    pub fn target_account(&self) -> Option<&Account> {
        self.target().map(|(account, _)| account)
    }

    /// Runs every hop in order and returns the final credentials.
    pub fn traverse(&self, options: &TraverseOptions) -> Result<Credentials, TraverseError> {
        log::info!("Traversing {}", self);
        let mut current: Option<Credentials> = None;
        for hop in &self.0 {
            current = Some(hop.traverse(current.as_ref(), options)?);
        }
        current.ok_or(TraverseError::EmptyPath)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<String> = self.0.iter().map(Hop::to_string).collect();
        write!(f, "{}", hops.join(" -> "))
    }
}

/// Everything a traversal needs besides the path itself. Cloning shares the
/// cache and lock registry.
#[derive(Debug, Clone)]
pub struct TraverseOptions {
    pub store: Arc<dyn ProfileStore>,
    pub assumer: Arc<dyn RoleAssumer>,
    pub mfa_prompt: Arc<dyn MfaPrompt>,
    pub cache: Arc<dyn CredentialCache>,
    pub locks: Arc<HopLocks>,
    pub session_name: String,
    pub lifetime: Duration,
    pub default_region: String,
    pub policy: Option<String>,
    pub mfa_code: Option<String>,
    pub mfa_serial: Option<String>,
}

impl TraverseOptions {
    /// Options with a fresh in-memory cache and lock registry.
    pub fn new(
        store: Arc<dyn ProfileStore>,
        assumer: Arc<dyn RoleAssumer>,
        mfa_prompt: Arc<dyn MfaPrompt>,
    ) -> Self {
        Self {
            store,
            assumer,
            mfa_prompt,
            cache: Arc::new(MapCache::default()),
            locks: Arc::new(HopLocks::new()),
            session_name: "wayfarer".to_string(),
            lifetime: Duration::from_secs(DEFAULT_LIFETIME_SECS),
            default_region: DEFAULT_REGION.to_string(),
            policy: None,
            mfa_code: None,
            mfa_serial: None,
        }
    }

    /// Serial from the options or derived from the caller's identity, and a
    /// code from the options or the MFA prompt.
    fn mfa_proof(&self, source: &Credentials) -> Result<MfaProof, TraverseError> {
        let serial = match &self.mfa_serial {
            Some(serial) => serial.clone(),
            None => {
                let identity = self.assumer.check_identity(source)?;
                sts::mfa_serial_from_arn(&identity.arn)?
            }
        };
        let code = match &self.mfa_code {
            Some(code) => code.clone(),
            None => self.mfa_prompt.code(&serial)?,
        };
        Ok(MfaProof { serial, code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hop_cache::NullCache;
    use crate::test_support::{StaticStore, StubAssumer, account, traverse_options};
    use std::thread;

    fn two_hop_path() -> Path {
        let mut jump = account("111111111111", &[], vec![]);
        jump.region = Some("eu-west-1".to_string());
        Path::new(vec![
            Hop::origin("work"),
            Hop::assume(jump, "jump", false),
            Hop::assume(account("222222222222", &[], vec![]), "admin", false),
        ])
    }

    #[test]
    fn test_hop_keys() {
        assert_eq!(Hop::origin("work").key(), "profile--work");
        let hop = Hop::assume(account("111111111111", &[], vec![]), "admin", true);
        assert_eq!(hop.key(), "111111111111-admin-true");
    }

    #[test]
    fn test_path_accessors_and_display() {
        let path = two_hop_path();
        assert_eq!(path.origin_profile(), Some("work"));
        assert_eq!(path.target_role(), Some("admin"));
        assert_eq!(path.target_account().unwrap().id, "222222222222");
        assert_eq!(
            path.to_string(),
            "profile:work -> 111111111111/jump -> 222222222222/admin"
        );
    }

    #[test]
    fn test_traverse_chains_credentials_and_regions() {
        let assumer = Arc::new(StubAssumer::new());
        let options = traverse_options(assumer.clone(), &[("work", "AKIAWORK", "s")]);

        let creds = two_hop_path().traverse(&options).unwrap();
        assert_eq!(creds.access_key_id, "ASIA-222222222222-admin");
        assert_eq!(assumer.assume_calls("111111111111-jump-false"), 1);
        assert_eq!(assumer.assume_calls("222222222222-admin-false"), 1);
        assert_eq!(
            assumer.requests(),
            vec![
                ("AKIAWORK".to_string(), "111111111111".to_string(), "eu-west-1".to_string()),
                (
                    "ASIA-111111111111-jump".to_string(),
                    "222222222222".to_string(),
                    "us-east-1".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_retraversal_with_valid_cache_makes_no_assume_calls() {
        let assumer = Arc::new(StubAssumer::new());
        let options = traverse_options(assumer.clone(), &[("work", "AKIAWORK", "s")]);
        let path = two_hop_path();

        let first = path.traverse(&options).unwrap();
        let total_before = assumer.total_assume_calls();
        let second = path.traverse(&options).unwrap();

        assert_eq!(first, second);
        assert_eq!(assumer.total_assume_calls(), total_before);
    }

    #[test]
    fn test_rejected_cache_entry_is_reacquired() {
        let assumer = Arc::new(StubAssumer::new().rejecting_probes());
        let options = traverse_options(assumer.clone(), &[("work", "AKIAWORK", "s")]);
        let path = two_hop_path();

        path.traverse(&options).unwrap();
        path.traverse(&options).unwrap();
        assert_eq!(assumer.assume_calls("222222222222-admin-false"), 2);
    }

    #[test]
    fn test_concurrent_traversals_share_one_assume_per_hop() {
        let assumer = Arc::new(StubAssumer::new().with_delay(Duration::from_millis(20)));
        let options = traverse_options(assumer.clone(), &[("work", "AKIAWORK", "s")]);
        let path = two_hop_path();

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| path.traverse(&options).unwrap());
            }
        });

        assert_eq!(assumer.assume_calls("111111111111-jump-false"), 1);
        assert_eq!(assumer.assume_calls("222222222222-admin-false"), 1);
    }

    #[test]
    fn test_mfa_uses_explicit_code_and_derived_serial() {
        let assumer = Arc::new(StubAssumer::new());
        let mut options = traverse_options(assumer.clone(), &[("work", "AKIAWORK", "s")]);
        options.mfa_code = Some("123456".to_string());
        let path = Path::new(vec![
            Hop::origin("work"),
            Hop::assume(account("333333333333", &[], vec![]), "secure", true),
        ]);

        path.traverse(&options).unwrap();
        assert_eq!(
            assumer.last_mfa(),
            Some(MfaProof {
                serial: "arn:aws:iam::000000000000:mfa/stub".to_string(),
                code: "123456".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_profile_fails() {
        let assumer = Arc::new(StubAssumer::new());
        let mut options = traverse_options(assumer.clone(), &[]);
        options.store = Arc::new(StaticStore::new(&[]));
        options.cache = Arc::new(NullCache);
        assert!(matches!(
            two_hop_path().traverse(&options),
            Err(TraverseError::Store(StoreError::NotFound(_)))
        ));
        assert_eq!(assumer.total_assume_calls(), 0);
    }

    #[test]
    fn test_empty_path() {
        let options = traverse_options(Arc::new(StubAssumer::new()), &[]);
        assert!(matches!(
            Path::default().traverse(&options),
            Err(TraverseError::EmptyPath)
        ));
    }
}
