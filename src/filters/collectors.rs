//! Sub-collector selection.
//!
//! Lets operators switch off expensive collection phases. Only the known
//! collector names are accepted.

use std::fmt;
use std::str::FromStr;

use super::{Filter, NameSet};
use crate::error::Error;

/// The sub-collectors the exporter knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectorName {
    Deployments,
    Jobs,
    ServiceDiscovery,
}

impl CollectorName {
    pub const ALL: [CollectorName; 3] = [
        CollectorName::Deployments,
        CollectorName::Jobs,
        CollectorName::ServiceDiscovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorName::Deployments => "Deployments",
            CollectorName::Jobs => "Jobs",
            CollectorName::ServiceDiscovery => "ServiceDiscovery",
        }
    }
}

impl fmt::Display for CollectorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectorName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectorName::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                Error::Config(format!(
                    "collector filter `{}` is not supported (expected one of Deployments, Jobs, ServiceDiscovery)",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectorsFilter {
    names: NameSet,
}

impl CollectorsFilter {
    /// Fails with `Error::Config` on the first unknown collector name.
    pub fn new<I, S>(names: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = NameSet::new(names);
        for name in names.iter() {
            name.parse::<CollectorName>()?;
        }
        Ok(Self { names })
    }

    pub fn enabled(&self, collector: CollectorName) -> bool {
        self.matches(collector.as_str())
    }
}

impl Filter for CollectorsFilter {
    fn matches(&self, candidate: &str) -> bool {
        self.names.contains(candidate)
    }
}
