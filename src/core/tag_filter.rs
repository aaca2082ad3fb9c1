// src/core/tag_filter.rs

use crate::models::Account;
use regex::Regex;
use std::fmt;

/// A single search criterion against an account's tags.
///
/// Built from `name:regex` (match the named tag's value) or a bare `regex`
/// (match any tag value). Matching is a regex search, not full-string equality.
#[derive(Debug, Clone)]
pub struct TagFilter {
    pub name: Option<String>,
    pub value: Regex,
}

impl TagFilter {
    /// Parses one filter argument.
    ///
    /// # Errors
    /// Returns the regex compilation error if the value pattern is invalid.
    pub fn parse(arg: &str) -> Result<Self, regex::Error> {
        let (name, pattern) = match arg.split_once(':') {
            Some((name, pattern)) => (Some(name.to_string()), pattern),
            None => (None, arg),
        };
        Ok(Self {
            name,
            value: Regex::new(pattern)?,
        })
    }

    /// Checks whether the account satisfies this filter.
    pub fn matches(&self, account: &Account) -> bool {
        match &self.name {
            // A missing tag is matched as the empty string.
            Some(name) => self
                .value
                .is_match(account.tags.get(name).unwrap_or("")),
            None => account.tags.iter().any(|(_, value)| self.value.is_match(value)),
        }
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{}", name, self.value.as_str()),
            None => write!(f, "{}", self.value.as_str()),
        }
    }
}

/// A conjunction of tag filters: an account must satisfy every one.
#[derive(Debug, Clone, Default)]
pub struct TagFilterSet(pub Vec<TagFilter>);

impl TagFilterSet {
    /// Parses every argument into a filter.
    ///
    /// # Errors
    /// Fails on the first argument whose pattern does not compile.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, regex::Error> {
        args.iter()
            .map(|a| TagFilter::parse(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// An empty set matches every account.
    pub fn matches(&self, account: &Account) -> bool {
        self.0.iter().all(|tf| tf.matches(account))
    }
}

impl fmt::Display for TagFilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tags;

    fn account(id: &str, tags: &[(&str, &str)]) -> Account {
        Account {
            id: id.to_string(),
            region: None,
            tags: tags.iter().copied().collect::<Tags>(),
            roles: vec![],
        }
    }

    #[test]
    fn test_bare_filter_matches_any_value() {
        let a = account("A", &[("env", "prod")]);
        let b = account("B", &[("env", "dev")]);
        let tfs = TagFilterSet::from_args(&["prod"]).unwrap();
        assert!(tfs.matches(&a));
        assert!(!tfs.matches(&b));
    }

    #[test]
    fn test_named_filter_is_a_regex_search() {
        let a = account("A", &[("env", "prod")]);
        let b = account("B", &[("env", "dev")]);
        let tfs = TagFilterSet::from_args(&["env:pr.*"]).unwrap();
        assert!(tfs.matches(&a));
        assert!(!tfs.matches(&b));

        // Search semantics: a substring is enough.
        let partial = TagFilterSet::from_args(&["env:ro"]).unwrap();
        assert!(partial.matches(&a));
    }

    #[test]
    fn test_named_filter_ignores_other_tags() {
        let a = account("A", &[("env", "dev"), ("owner", "prod-team")]);
        let tfs = TagFilterSet::from_args(&["env:prod"]).unwrap();
        assert!(!tfs.matches(&a));
    }

    #[test]
    fn test_named_filter_treats_missing_tag_as_empty() {
        let a = account("A", &[("team", "core")]);
        assert!(TagFilterSet::from_args(&["env:^$"]).unwrap().matches(&a));
        assert!(TagFilterSet::from_args(&["env:.*"]).unwrap().matches(&a));
        assert!(!TagFilterSet::from_args(&["env:prod"]).unwrap().matches(&a));
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let a = account("A", &[("env", "prod"), ("team", "core")]);
        let b = account("B", &[("env", "prod"), ("team", "edge")]);
        let tfs = TagFilterSet::from_args(&["prod", "team:core"]).unwrap();
        assert!(tfs.matches(&a));
        assert!(!tfs.matches(&b));
    }

    #[test]
    fn test_value_may_contain_colons() {
        let a = account("A", &[("url", "https://example.com")]);
        let tfs = TagFilterSet::from_args(&["url:https://"]).unwrap();
        assert!(tfs.matches(&a));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        assert!(TagFilterSet::from_args(&["env:("]).is_err());
    }

    #[test]
    fn test_empty_set_matches_everything() {
        let tfs = TagFilterSet::default();
        assert!(tfs.matches(&account("A", &[])));
    }
}
