// src/core/catalog.rs

use crate::{
    core::tag_filter::TagFilterSet,
    models::{Account, Catalog, SourceRef},
    system::prompt::{Prompt, PromptError},
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

lazy_static! {
    /// Matches an account number with an optional `/role_name`.
    static ref ACCOUNT_REGEX: Regex =
        Regex::new(r"^(\d+)(?:/([a-zA-Z0-9+=,.@_-]+))?$").expect("account regex is valid");
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse catalog '{file}': {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Spec version mismatch in '{file}': expected {expected}, got {actual}")]
    VersionMismatch {
        file: String,
        expected: u32,
        actual: u32,
    },
    #[error("Path error: {0}")]
    Path(#[from] crate::core::paths::PathError),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Unable to locate an account with provided info.")]
    NoMatchingAccount,
    #[error("Invalid tag filter: {0}")]
    InvalidFilter(#[from] regex::Error),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// A named collection of catalogs, used for lookups and searches across all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pack {
    catalogs: BTreeMap<String, Catalog>,
}

impl Pack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, catalog: Catalog) {
        self.catalogs.insert(name.into(), catalog);
    }

    pub fn catalogs(&self) -> impl Iterator<Item = (&String, &Catalog)> {
        self.catalogs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.values().all(|c| c.accounts.is_empty())
    }

    /// Every account across all catalogs, in catalog-name order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.catalogs.values().flat_map(|c| c.accounts.iter())
    }

    /// Every profile label any role names as a source, sorted.
    pub fn profile_labels(&self) -> BTreeSet<&str> {
        self.accounts()
            .flat_map(|a| a.roles.iter())
            .flat_map(|r| r.sources.iter())
            .filter_map(|s| match s.reference() {
                SourceRef::Profile(label) => Some(label),
                SourceRef::Role { .. } => None,
            })
            .collect()
    }

    /// Finds the first account with this exact id.
    pub fn lookup(&self, account_id: &str) -> Option<&Account> {
        log::trace!("Looking up account '{}' in pack", account_id);
        self.accounts().find(|a| a.id == account_id)
    }

    /// Returns every account matching all filters in the set.
    pub fn search(&self, filters: &TagFilterSet) -> Vec<&Account> {
        log::debug!("Searching pack for {}", filters);
        self.accounts().filter(|a| filters.matches(a)).collect()
    }

    /// Resolves free-form arguments to exactly one account.
    ///
    /// A single `<digits>[/<role>]` argument is a direct lookup. Anything else is
    /// a tag search; several matches are disambiguated through the prompt.
    ///
    /// # Errors
    /// `AccountNotFound` for an unknown direct id, `NoMatchingAccount` when the
    /// search is empty, `InvalidFilter` for a bad pattern, or a prompt error.
    pub fn find<S: AsRef<str>>(
        &self,
        args: &[S],
        prompt: &dyn Prompt,
    ) -> Result<&Account, CatalogError> {
        if let Some(account_id) = direct_account_id(args) {
            return self
                .lookup(account_id)
                .ok_or_else(|| CatalogError::AccountNotFound(account_id.to_string()));
        }

        let filters = TagFilterSet::from_args(args)?;
        let accounts = self.search(&filters);
        match accounts.as_slice() {
            [] => Err(CatalogError::NoMatchingAccount),
            [only] => Ok(*only),
            many => {
                let rows: Vec<Vec<String>> = many
                    .iter()
                    .map(|a| {
                        let mut row = vec![a.id.clone()];
                        row.extend(a.tags.pairs());
                        row
                    })
                    .collect();
                let chosen = prompt.select("Desired Account:", &rows)?;
                many.get(chosen).copied().ok_or(CatalogError::Prompt(
                    PromptError::OutOfRange {
                        index: chosen,
                        count: many.len(),
                    },
                ))
            }
        }
    }
}

fn direct_match<S: AsRef<str>>(args: &[S]) -> Option<regex::Captures<'_>> {
    match args {
        [only] => ACCOUNT_REGEX.captures(only.as_ref()),
        _ => None,
    }
}

/// The account id when `args` is a single direct `<digits>[/<role>]` reference.
pub fn direct_account_id<S: AsRef<str>>(args: &[S]) -> Option<&str> {
    direct_match(args).and_then(|caps| caps.get(1)).map(|m| m.as_str())
}

/// The role name embedded in a direct `<digits>/<role>` reference, if any.
pub fn direct_role_hint<S: AsRef<str>>(args: &[S]) -> Option<&str> {
    direct_match(args).and_then(|caps| caps.get(2)).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedPrompt, account, pack_of, role};

    fn sample_pack() -> Pack {
        pack_of(vec![
            account("111111111111", &[("env", "prod"), ("team", "core")], vec![]),
            account("222222222222", &[("env", "dev"), ("team", "core")], vec![]),
            account("333333333333", &[("env", "prod"), ("team", "edge")], vec![]),
        ])
    }

    #[test]
    fn test_lookup_first_exact_match() {
        let pack = sample_pack();
        assert_eq!(pack.lookup("222222222222").unwrap().id, "222222222222");
        assert!(pack.lookup("2222").is_none());
    }

    #[test]
    fn test_lookup_across_catalogs() {
        let mut pack = Pack::new();
        pack.insert("a", Catalog::new(vec![account("111111111111", &[], vec![])]));
        pack.insert("b", Catalog::new(vec![account("999999999999", &[], vec![])]));
        assert!(pack.lookup("999999999999").is_some());
        assert_eq!(pack.accounts().count(), 2);
    }

    #[test]
    fn test_profile_labels_skip_role_sources() {
        let pack = pack_of(vec![
            account("111111111111", &[], vec![role("jump", false, &["work", "audit"])]),
            account(
                "222222222222",
                &[],
                vec![role("admin", false, &["111111111111/jump", "work"])],
            ),
        ]);
        let labels: Vec<&str> = pack.profile_labels().into_iter().collect();
        assert_eq!(labels, vec!["audit", "work"]);
    }

    #[test]
    fn test_search_is_conjunctive() {
        let pack = sample_pack();
        let tfs = TagFilterSet::from_args(&["prod", "team:core"]).unwrap();
        let found: Vec<_> = pack.search(&tfs).iter().map(|a| a.id.clone()).collect();
        assert_eq!(found, vec!["111111111111"]);
    }

    #[test]
    fn test_find_direct_id_with_role() {
        let pack = sample_pack();
        let prompt = ScriptedPrompt::new(vec![]);
        let args = ["333333333333/admin"];
        let found = pack.find(&args, &prompt).unwrap();
        assert_eq!(found.id, "333333333333");
        assert_eq!(direct_role_hint(&args), Some("admin"));
        assert_eq!(prompt.calls(), 0);
    }

    #[test]
    fn test_find_unknown_direct_id() {
        let pack = sample_pack();
        let prompt = ScriptedPrompt::new(vec![]);
        let result = pack.find(&["444444444444"], &prompt);
        assert!(matches!(result, Err(CatalogError::AccountNotFound(id)) if id == "444444444444"));
    }

    #[test]
    fn test_find_single_search_result() {
        let pack = sample_pack();
        let prompt = ScriptedPrompt::new(vec![]);
        let found = pack.find(&["dev"], &prompt).unwrap();
        assert_eq!(found.id, "222222222222");
        assert_eq!(prompt.calls(), 0);
    }

    #[test]
    fn test_find_prompts_on_ambiguity() {
        let pack = sample_pack();
        let prompt = ScriptedPrompt::new(vec![1]);
        let found = pack.find(&["env:prod"], &prompt).unwrap();
        assert_eq!(found.id, "333333333333");
        assert_eq!(
            prompt.last_options(),
            vec![
                vec![
                    "111111111111".to_string(),
                    "env:prod".to_string(),
                    "team:core".to_string()
                ],
                vec![
                    "333333333333".to_string(),
                    "env:prod".to_string(),
                    "team:edge".to_string()
                ],
            ]
        );
    }

    #[test]
    fn test_find_no_match() {
        let pack = sample_pack();
        let prompt = ScriptedPrompt::new(vec![]);
        assert!(matches!(
            pack.find(&["staging"], &prompt),
            Err(CatalogError::NoMatchingAccount)
        ));
    }
}
