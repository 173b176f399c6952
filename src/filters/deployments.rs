//! Deployment-name filter.

use super::{Filter, NameSet};

/// Keeps only the named deployments; keeps all when no names are configured.
#[derive(Debug, Clone, Default)]
pub struct DeploymentsFilter {
    names: NameSet,
}

impl DeploymentsFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: NameSet::new(names),
        }
    }
}

impl Filter for DeploymentsFilter {
    fn matches(&self, candidate: &str) -> bool {
        self.names.contains(candidate)
    }
}
