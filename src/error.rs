//! Error taxonomy for the exporter.
//!
//! Startup errors (`Config`, `Auth`) are fatal and end the process before the
//! listener starts. Scrape-time errors (`Fetch`, `Collect`, `Write`) are logged
//! and isolated to the deployment or sub-collector that produced them.

use std::path::PathBuf;

use crate::director::ClientError;

/// Convenience alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad filter, regexp or authentication option input.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential exchange with the director or UAA failed.
    #[error("authentication error: {context}: {source}")]
    Auth {
        context: String,
        #[source]
        source: ClientError,
    },

    /// Fetching the deployment list or one deployment's instances failed.
    #[error("failed to fetch {target}: {source}")]
    Fetch {
        target: String,
        #[source]
        source: ClientError,
    },

    /// A sub-collector failed internally.
    #[error("collector {collector} failed: {message}")]
    Collect { collector: String, message: String },

    /// The service discovery file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn auth(context: impl Into<String>, source: ClientError) -> Self {
        Error::Auth {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn fetch(target: impl Into<String>, source: ClientError) -> Self {
        Error::Fetch {
            target: target.into(),
            source,
        }
    }
}
