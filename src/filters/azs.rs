//! Availability-zone filter.

use super::{Filter, NameSet};

/// Keeps instances placed in one of the configured AZs.
///
/// Instances without an AZ only pass when the filter is unconfigured.
#[derive(Debug, Clone, Default)]
pub struct AzsFilter {
    azs: NameSet,
}

impl AzsFilter {
    pub fn new<I, S>(azs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            azs: NameSet::new(azs),
        }
    }
}

impl Filter for AzsFilter {
    fn matches(&self, candidate: &str) -> bool {
        self.azs.contains(candidate)
    }
}
