//! Build metadata emitted by `build.rs` and exposed as a metric.

use prometheus::{GaugeVec, Opts};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn revision() -> &'static str {
    option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
}

pub fn branch() -> &'static str {
    option_env!("VERGEN_GIT_BRANCH").unwrap_or("unknown")
}

pub fn build_date() -> &'static str {
    option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
}

/// `<namespace>_exporter_build_info{version, revision, branch, build_date} 1`.
pub fn build_info_gauge(namespace: &str) -> prometheus::Result<GaugeVec> {
    let gauge = GaugeVec::new(
        Opts::new(
            "exporter_build_info",
            "A metric with a constant '1' value labeled by version, revision, branch, and build date from which the exporter was built.",
        )
        .namespace(namespace),
        &["version", "revision", "branch", "build_date"],
    )?;
    gauge
        .with_label_values(&[VERSION, revision(), branch(), build_date()])
        .set(1.0);
    Ok(gauge)
}
