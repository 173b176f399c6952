//! Regular-expression filter for process names.

use regex::Regex;

use super::Filter;
use crate::error::Error;

/// Matches when any of the configured patterns matches; matches everything
/// when no pattern is configured.
#[derive(Debug, Clone, Default)]
pub struct RegexpFilter {
    regexps: Vec<Regex>,
}

impl RegexpFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let regexps = patterns
            .into_iter()
            .filter(|p| !p.as_ref().is_empty())
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    Error::Config(format!("invalid regexp `{}`: {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { regexps })
    }
}

impl Filter for RegexpFilter {
    fn matches(&self, candidate: &str) -> bool {
        self.regexps.is_empty() || self.regexps.iter().any(|r| r.is_match(candidate))
    }
}
