//! Deterministic stand-ins for the external collaborators, shared by unit tests.

use crate::{
    core::{catalog::Pack, path::TraverseOptions},
    models::{Account, Catalog, Credentials, ExecResult, Role, Source, Tags},
    system::{
        executor::CommandRunner,
        mfa::{MfaError, MfaPrompt},
        profiles::{ProfileStore, StoreError},
        prompt::{Prompt, PromptError},
        sts::{AssumeError, AssumeRoleRequest, CallerIdentity, MfaProof, RoleAssumer},
    },
};
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

pub(crate) fn account(id: &str, tags: &[(&str, &str)], roles: Vec<Role>) -> Account {
    Account {
        id: id.to_string(),
        region: None,
        tags: tags.iter().copied().collect::<Tags>(),
        roles,
    }
}

pub(crate) fn role(name: &str, mfa: bool, sources: &[&str]) -> Role {
    Role {
        name: name.to_string(),
        mfa,
        sources: sources.iter().map(|s| Source::new(*s)).collect(),
    }
}

pub(crate) fn pack_of(accounts: Vec<Account>) -> Pack {
    let mut pack = Pack::new();
    pack.insert("main", Catalog::new(accounts));
    pack
}

/// Options with a fresh cache, the given assumer and a static profile store.
pub(crate) fn traverse_options(
    assumer: Arc<StubAssumer>,
    profiles: &[(&str, &str, &str)],
) -> TraverseOptions {
    TraverseOptions::new(
        Arc::new(StaticStore::new(profiles)),
        assumer,
        Arc::new(FailingMfaPrompt),
    )
}

/// Answers selections from a script; fails once the script runs out.
#[derive(Debug, Default)]
pub(crate) struct ScriptedPrompt {
    answers: Mutex<VecDeque<usize>>,
    calls: AtomicUsize,
    last_options: Mutex<Vec<Vec<String>>>,
}

impl ScriptedPrompt {
    pub(crate) fn new(answers: Vec<usize>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_options(&self) -> Vec<Vec<String>> {
        self.last_options.lock().clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn select(&self, message: &str, options: &[Vec<String>]) -> Result<usize, PromptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = options.to_vec();
        self.answers
            .lock()
            .pop_front()
            .ok_or_else(|| PromptError::Unavailable(format!("no scripted answer for '{}'", message)))
    }
}

#[derive(Debug)]
pub(crate) struct FailingMfaPrompt;

impl MfaPrompt for FailingMfaPrompt {
    fn code(&self, serial: &str) -> Result<String, MfaError> {
        Err(MfaError::InvalidCode(serial.to_string()))
    }
}

/// A profile store backed by a fixed map.
#[derive(Debug, Default)]
pub(crate) struct StaticStore {
    profiles: HashMap<String, Credentials>,
}

impl StaticStore {
    pub(crate) fn new(profiles: &[(&str, &str, &str)]) -> Self {
        Self {
            profiles: profiles
                .iter()
                .map(|(name, key, secret)| (name.to_string(), Credentials::long_lived(*key, *secret)))
                .collect(),
        }
    }
}

impl ProfileStore for StaticStore {
    fn lookup(&self, profile: &str) -> Result<Credentials, StoreError> {
        self.profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(profile.to_string()))
    }

    fn check(&self, profile: &str) -> bool {
        self.profiles.contains_key(profile)
    }

    fn delete(&self, profile: &str) -> Result<(), StoreError> {
        Err(StoreError::NotFound(profile.to_string()))
    }
}

/// A role assumer that counts calls per hop key and mints predictable
/// credentials (`ASIA-<account>-<role>`).
#[derive(Debug, Default)]
pub(crate) struct StubAssumer {
    assume_calls: Mutex<HashMap<String, usize>>,
    identity_calls: AtomicUsize,
    requests: Mutex<Vec<(String, String, String)>>,
    last_mfa: Mutex<Option<MfaProof>>,
    reject_probes: bool,
    failing_account: Option<String>,
    delay: Option<Duration>,
}

impl StubAssumer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn rejecting_probes(mut self) -> Self {
        self.reject_probes = true;
        self
    }

    pub(crate) fn failing_for(mut self, account_id: &str) -> Self {
        self.failing_account = Some(account_id.to_string());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn assume_calls(&self, key: &str) -> usize {
        self.assume_calls.lock().get(key).copied().unwrap_or(0)
    }

    pub(crate) fn total_assume_calls(&self) -> usize {
        self.assume_calls.lock().values().sum()
    }

    pub(crate) fn identity_calls(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst)
    }

    /// `(source access key, account id, region)` of every assume call, in order.
    pub(crate) fn requests(&self) -> Vec<(String, String, String)> {
        self.requests.lock().clone()
    }

    pub(crate) fn last_mfa(&self) -> Option<MfaProof> {
        self.last_mfa.lock().clone()
    }
}

impl RoleAssumer for StubAssumer {
    fn assume_role(
        &self,
        source: &Credentials,
        request: &AssumeRoleRequest,
    ) -> Result<Credentials, AssumeError> {
        let key = format!(
            "{}-{}-{}",
            request.account_id,
            request.role_name,
            request.mfa.is_some()
        );
        *self.assume_calls.lock().entry(key).or_insert(0) += 1;
        self.requests.lock().push((
            source.access_key_id.clone(),
            request.account_id.clone(),
            request.region.clone(),
        ));
        if request.mfa.is_some() {
            *self.last_mfa.lock() = request.mfa.clone();
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.failing_account.as_deref() == Some(request.account_id.as_str()) {
            return Err(AssumeError::Rejected {
                role_arn: request.role_arn(),
                message: "AccessDenied".to_string(),
            });
        }
        Ok(Credentials {
            access_key_id: format!("ASIA-{}-{}", request.account_id, request.role_name),
            secret_access_key: "stub-secret".to_string(),
            session_token: Some("stub-token".to_string()),
            region: Some(request.region.clone()),
            expiration: Some(Utc::now() + ChronoDuration::hours(1)),
        })
    }

    fn check_identity(&self, _credentials: &Credentials) -> Result<CallerIdentity, AssumeError> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_probes {
            return Err(AssumeError::Rejected {
                role_arn: "identity".to_string(),
                message: "ExpiredToken".to_string(),
            });
        }
        Ok(CallerIdentity {
            account: "000000000000".to_string(),
            arn: "arn:aws:iam::000000000000:user/stub".to_string(),
            user_id: "AIDASTUB".to_string(),
        })
    }
}

/// Records invocations and echoes the access key id on stdout.
#[derive(Debug, Default)]
pub(crate) struct StubRunner {
    calls: AtomicUsize,
}

impl StubRunner {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CommandRunner for StubRunner {
    fn run(&self, _command: &[String], credentials: &Credentials) -> ExecResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ExecResult {
            exit_code: 0,
            stdout: credentials.access_key_id.clone(),
            stderr: String::new(),
            error: None,
        }
    }
}
