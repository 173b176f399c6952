//! Filters applied to the director topology before metrics are derived.
//!
//! This module provides:
//! - `deployments`: deployment-name inclusion
//! - `azs`: availability-zone inclusion
//! - `collectors`: sub-collector selection
//! - `regexp`: process-name pattern matching
//!
//! Every filter accepts everything when constructed from an empty list.

pub mod azs;
pub mod collectors;
pub mod deployments;
pub mod regexp;

use std::collections::HashSet;
use std::fmt::Debug;

pub use azs::AzsFilter;
pub use collectors::{CollectorName, CollectorsFilter};
pub use deployments::DeploymentsFilter;
pub use regexp::RegexpFilter;

/// Predicate over a single topology value (deployment name, AZ, collector, process name).
pub trait Filter: Send + Sync + Debug {
    fn matches(&self, candidate: &str) -> bool;
}

/// Exact, case-sensitive set of names. Empty means "match everything".
#[derive(Debug, Clone, Default)]
pub(crate) struct NameSet {
    names: HashSet<String>,
}

impl NameSet {
    pub(crate) fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    pub(crate) fn contains(&self, candidate: &str) -> bool {
        self.names.is_empty() || self.names.contains(candidate)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Splits a comma separated flag value into trimmed, non-empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
