//! BOSH Exporter Library
//!
//! This library talks to a BOSH director, turns its deployment topology into
//! Prometheus metrics and keeps a file-based service discovery document in
//! sync with the processes running in the fleet.
//!
//! # Features
//!
//! - **Credential Resolution**: Basic auth, UAA client credentials or UAA password grant,
//!   chosen from what the director advertises
//! - **Filtering**: Restrict deployments, availability zones, collectors and SD processes
//! - **Isolated Collectors**: A failing deployment or sub-collector never fails the scrape
//! - **Atomic Service Discovery**: The SD file is replaced, never rewritten in place
//!
//! # Usage
//!
//! ```rust,no_run
//! use bosh_exporter::auth::{self, AuthSettings, HttpClientFactory};
//! use bosh_exporter::collectors::{BoshCollector, JobsCollector, MetricsContext, SubCollector};
//! use bosh_exporter::deployments::Fetcher;
//! use bosh_exporter::filters::{AzsFilter, CollectorsFilter, DeploymentsFilter};
//!
//! # async fn run(settings: AuthSettings) -> Result<(), Box<dyn std::error::Error>> {
//! let factory = HttpClientFactory::new(&settings);
//! let session = auth::resolve(&settings, &factory).await?;
//!
//! let ctx = MetricsContext {
//!     namespace: "bosh".into(),
//!     environment: "prod".into(),
//!     bosh_name: session.info().name.clone(),
//!     bosh_uuid: session.info().uuid.clone(),
//! };
//! let fetcher = Fetcher::new(session.director(), DeploymentsFilter::default(), AzsFilter::default());
//! let jobs: Box<dyn SubCollector> = Box::new(JobsCollector::new(ctx.clone())?);
//! let collector = BoshCollector::new(ctx, fetcher, vec![jobs], &CollectorsFilter::default())?;
//!
//! let registry = prometheus::Registry::new();
//! registry.register(Box::new(collector))?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod build_info;
pub mod collectors;
pub mod deployments;
pub mod director;
pub mod error;
pub mod filters;
pub mod service_discovery;

// Re-export main types for convenience
pub use collectors::{BoshCollector, MetricsContext};
pub use error::{Error, Result};
