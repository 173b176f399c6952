//! Director API access.
//!
//! The `Director` trait is the seam between the exporter core and the BOSH
//! director. `HttpDirector` talks to a real director; tests substitute
//! in-memory implementations.

pub mod client;
pub mod models;

use async_trait::async_trait;
use std::time::Duration;

pub use client::HttpDirector;
pub use models::{
    AuthInfo, CpuVitals, DeploymentSummary, DirectorInfo, DiskUsage, DiskVitals, InstanceInfo,
    MemVitals, NameVersion, ProcessInfo, Vitals,
};

/// Failure talking to the director or the UAA server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid URL `{url}`: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid CA certificate: {0}")]
    CaCert(#[source] reqwest::Error),

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("task {id} finished in state `{state}`")]
    Task { id: u64, state: String },

    #[error("task {id} did not finish within {timeout:?}")]
    TaskTimeout { id: u64, timeout: Duration },
}

/// Read-only operations the exporter needs from a director.
#[async_trait]
pub trait Director: Send + Sync {
    async fn info(&self) -> Result<DirectorInfo, ClientError>;

    async fn deployments(&self) -> Result<Vec<DeploymentSummary>, ClientError>;

    /// Full instance details (vitals and processes) of one deployment.
    async fn instance_infos(&self, deployment: &str) -> Result<Vec<InstanceInfo>, ClientError>;
}

/// Builds a reqwest client trusting the given PEM bundle (if any).
///
/// Redirects are not followed: the director answers long running requests
/// with a redirect to a task that has to be polled explicitly.
pub(crate) fn http_client(ca_cert: &str, timeout: Duration) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("bosh-exporter/", env!("CARGO_PKG_VERSION")));

    if !ca_cert.trim().is_empty() {
        let certs =
            reqwest::Certificate::from_pem_bundle(ca_cert.as_bytes()).map_err(ClientError::CaCert)?;
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
    }

    builder.build().map_err(ClientError::Build)
}

pub(crate) fn parse_url(url: &str) -> Result<url::Url, ClientError> {
    url::Url::parse(url).map_err(|source| ClientError::Url {
        url: url.to_string(),
        source,
    })
}
