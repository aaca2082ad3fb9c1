//! # Grapher
//!
//! Turns a target query into a concrete [`Path`]. Resolution has two stages:
//!
//! 1. **Discovery** (`find_all_paths`): every role of the target account is
//!    traced back through its sources until a profile is reached. Sources that
//!    point at unknown accounts or roles, or back into the chain currently
//!    being traced, are dead ends and are dropped silently.
//! 2. **Narrowing**: the candidate set is reduced first by final role, then by
//!    origin profile, using hints where they match and the prompt otherwise.

use crate::{
    core::{
        catalog::{self, CatalogError, Pack},
        path::{Hop, Path},
        tag_filter::TagFilterSet,
    },
    models::{Account, Role, SourceRef},
    system::prompt::{self, Prompt, PromptError},
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("Unable to resolve a path to account {account}.")]
    NoViablePath { account: String },
}

#[derive(Debug, Clone)]
pub struct Grapher {
    pack: Arc<Pack>,
    prompt: Arc<dyn Prompt>,
}

impl Grapher {
    pub fn new(pack: Arc<Pack>, prompt: Arc<dyn Prompt>) -> Self {
        Self { pack, prompt }
    }

    pub fn pack(&self) -> &Pack {
        &self.pack
    }

    /// Every viable path to any role of `account`, origin first.
    pub fn find_all_paths(&self, account: &Account) -> Vec<Path> {
        let mut stack = Vec::new();
        let paths: Vec<Path> = account
            .roles
            .iter()
            .flat_map(|role| self.trace_role(account, role, &mut stack))
            .collect();
        log::debug!("Found {} path(s) to account {}", paths.len(), account.id);
        paths
    }

    fn trace_role(
        &self,
        account: &Account,
        role: &Role,
        stack: &mut Vec<(String, String)>,
    ) -> Vec<Path> {
        stack.push((account.id.clone(), role.name.clone()));
        let mut found = Vec::new();

        for source in &role.sources {
            let sub_paths = match source.reference() {
                SourceRef::Profile(label) => vec![Path::new(vec![Hop::origin(label)])],
                SourceRef::Role {
                    account_id,
                    role_name,
                } => {
                    let upstream = self
                        .pack
                        .lookup(account_id)
                        .and_then(|acc| acc.lookup_role(role_name).map(|r| (acc, r)));
                    match upstream {
                        None => {
                            log::debug!("Dead end: {}/{} is not in the catalog", account_id, role_name);
                            continue;
                        }
                        Some(_)
                            if stack
                                .iter()
                                .any(|(a, r)| a == account_id && r == role_name) =>
                        {
                            log::debug!("Dead end: {}/{} forms a cycle", account_id, role_name);
                            continue;
                        }
                        Some((up_account, up_role)) => self.trace_role(up_account, up_role, stack),
                    }
                }
            };

            for mut path in sub_paths {
                path.push(Hop::assume(account.clone(), role.name.clone(), role.mfa));
                found.push(path);
            }
        }

        stack.pop();
        found
    }

    /// Reduces `paths` to one: by final role, then by origin profile.
    pub fn narrow(
        &self,
        account_id: &str,
        paths: Vec<Path>,
        role_hints: &[String],
        profile_hints: &[String],
    ) -> Result<Path, GraphError> {
        let no_path = || GraphError::NoViablePath {
            account: account_id.to_string(),
        };
        if paths.is_empty() {
            return Err(no_path());
        }

        let roles: Vec<String> = paths
            .iter()
            .filter_map(|p| p.target_role().map(str::to_string))
            .collect();
        let role = prompt::select_with_hints(self.prompt.as_ref(), "Desired Role:", &roles, role_hints)?;
        let paths: Vec<Path> = paths
            .into_iter()
            .filter(|p| p.target_role() == Some(role.as_str()))
            .collect();

        let profiles: Vec<String> = paths
            .iter()
            .filter_map(|p| p.origin_profile().map(str::to_string))
            .collect();
        let profile = prompt::select_with_hints(
            self.prompt.as_ref(),
            "Desired Profile:",
            &profiles,
            profile_hints,
        )?;
        let paths: Vec<Path> = paths
            .into_iter()
            .filter(|p| p.origin_profile() == Some(profile.as_str()))
            .collect();

        if paths.len() > 1 {
            log::warn!(
                "{} paths remain for {} via '{}' to '{}'; using the first",
                paths.len(),
                account_id,
                profile,
                role
            );
        }
        paths.into_iter().next().ok_or_else(no_path)
    }

    /// Resolves free-form args to one account and one path to it.
    ///
    /// A direct `<account>/<role>` argument adds its role to `role_names`.
    pub fn resolve<S: AsRef<str>>(
        &self,
        args: &[S],
        role_names: &[String],
        profile_names: &[String],
    ) -> Result<Path, GraphError> {
        let account = self.pack.find(args, self.prompt.as_ref())?;
        let mut role_hints = role_names.to_vec();
        if let Some(role) = catalog::direct_role_hint(args) {
            role_hints.push(role.to_string());
        }
        let paths = self.find_all_paths(account);
        self.narrow(&account.id, paths, &role_hints, profile_names)
    }

    fn bulk_targets<S: AsRef<str>>(&self, args: &[S]) -> Result<Vec<&Account>, GraphError> {
        if let Some(account_id) = catalog::direct_account_id(args) {
            let account = self
                .pack
                .lookup(account_id)
                .ok_or_else(|| CatalogError::AccountNotFound(account_id.to_string()))?;
            return Ok(vec![account]);
        }
        let filters = TagFilterSet::from_args(args).map_err(CatalogError::from)?;
        let mut accounts = self.pack.search(&filters);
        // Ids repeat across catalogs; keep the first copy, as lookup does.
        let mut seen = HashSet::new();
        accounts.retain(|a| seen.insert(a.id.as_str()));
        if accounts.is_empty() {
            return Err(CatalogError::NoMatchingAccount.into());
        }
        log::info!("{} account(s) match {}", accounts.len(), filters);
        Ok(accounts)
    }

    /// One path per account matching the tag filters, each narrowed with the
    /// same hints. Any account without a path fails the whole resolution.
    pub fn resolve_all<S: AsRef<str>>(
        &self,
        args: &[S],
        role_names: &[String],
        profile_names: &[String],
    ) -> Result<Vec<Path>, GraphError> {
        self.bulk_targets(args)?
            .into_iter()
            .map(|account| {
                let paths = self.find_all_paths(account);
                self.narrow(&account.id, paths, role_names, profile_names)
            })
            .collect()
    }

    /// Like [`Self::resolve_all`], but the role and profile picked for the first
    /// account become the only hints for the rest.
    pub fn resolve_all_pinned<S: AsRef<str>>(
        &self,
        args: &[S],
        role_names: &[String],
        profile_names: &[String],
    ) -> Result<Vec<Path>, GraphError> {
        let mut pinned: Option<(Vec<String>, Vec<String>)> = None;
        let mut resolved = Vec::new();

        for account in self.bulk_targets(args)? {
            let (roles, profiles) = match &pinned {
                Some((r, p)) => (r.as_slice(), p.as_slice()),
                None => (role_names, profile_names),
            };
            let path = self.narrow(&account.id, self.find_all_paths(account), roles, profiles)?;
            if pinned.is_none() {
                pinned = Some((
                    path.target_role().map(str::to_string).into_iter().collect(),
                    path.origin_profile().map(str::to_string).into_iter().collect(),
                ));
            }
            resolved.push(path);
        }
        Ok(resolved)
    }
}
