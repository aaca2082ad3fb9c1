// src/models.rs

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::CATALOG_SPEC_VERSION;

lazy_static! {
    /// Matches `<12-digit account>/<role name>`. Role names may contain
    /// alphanumerics and `+=,.@_-`.
    static ref ROLE_SOURCE_REGEX: Regex =
        Regex::new(r"^(\d{12})/([a-zA-Z0-9+=,.@_-]+)$").expect("role source regex is valid");
}

// --- CATALOG MODELS (What is read from a catalog file) ---

/// The upstream dependency of a role: another role, or a locally stored profile.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: String,
}

/// How a `Source` path is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRef<'a> {
    /// Credentials come from assuming `role_name` in `account_id` first.
    Role {
        account_id: &'a str,
        role_name: &'a str,
    },
    /// Credentials come from the named long-lived profile.
    Profile(&'a str),
}

impl Source {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Classifies the source path. Anything that is not an `account/role`
    /// reference is treated as a profile label.
    pub fn reference(&self) -> SourceRef<'_> {
        match ROLE_SOURCE_REGEX.captures(&self.path) {
            Some(caps) => match (caps.get(1), caps.get(2)) {
                (Some(account), Some(role)) => SourceRef::Role {
                    account_id: account.as_str(),
                    role_name: role.as_str(),
                },
                _ => SourceRef::Profile(&self.path),
            },
            None => SourceRef::Profile(&self.path),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub mfa: bool,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Free-form metadata about an account, used for searching.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Tags(pub BTreeMap<String, String>);

impl Tags {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Returns each tag as `name:value`, sorted by name.
    pub fn pairs(&self) -> Vec<String> {
        self.0.iter().map(|(k, v)| format!("{}:{}", k, v)).collect()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pairs().join(", "))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A role-assumption target.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    #[serde(rename = "account")]
    pub id: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Account {
    /// Finds a role by exact name.
    pub fn lookup_role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }

    /// The configured region, treating an empty string as unset.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref().filter(|r| !r.is_empty())
    }
}

/// A versioned, ordered collection of accounts, as stored in one catalog file.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Catalog {
    /// Creates a catalog stamped with the current schema version and time.
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            version: CATALOG_SPEC_VERSION,
            created: Some(Utc::now()),
            accounts,
        }
    }
}

// --- CREDENTIAL MODELS ---

/// A set of AWS credentials, either long-lived (from a profile) or short-lived
/// (from a role assumption).
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Builds long-lived credentials with no session token.
    pub fn long_lived(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            region: None,
            expiration: None,
        }
    }

    /// True if the credentials carry an expiration that has already passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }

    /// Translates the credentials into the environment variables the AWS
    /// tooling expects. Empty values are omitted.
    pub fn to_env_vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            ("AWS_ACCESS_KEY_ID".to_string(), self.access_key_id.clone()),
            (
                "AWS_SECRET_ACCESS_KEY".to_string(),
                self.secret_access_key.clone(),
            ),
        ];
        if let Some(token) = &self.session_token {
            vars.push(("AWS_SESSION_TOKEN".to_string(), token.clone()));
            vars.push(("AWS_SECURITY_TOKEN".to_string(), token.clone()));
        }
        if let Some(region) = &self.region {
            vars.push(("AWS_REGION".to_string(), region.clone()));
            vars.push(("AWS_DEFAULT_REGION".to_string(), region.clone()));
        }
        if let Some(exp) = &self.expiration {
            vars.push(("AWS_CREDENTIAL_EXPIRATION".to_string(), exp.to_rfc3339()));
        }
        vars.retain(|(_, v)| !v.is_empty());
        vars
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "** redacted **"),
            )
            .field("region", &self.region)
            .field("expiration", &self.expiration)
            .finish()
    }
}

// --- EXECUTION MODELS ---

/// The outcome of running one command against one account.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    #[serde(rename = "exitcode")]
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecResult {
    /// A result for a job that never got to run its command.
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error.to_string()),
        }
    }
}
