//! CLI arguments for bosh-exporter.
//!
//! Every option can also be set through a `BOSH_EXPORTER_*` environment
//! variable. Values given here win over the config file.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "bosh-exporter",
    about = "Prometheus exporter for BOSH director deployments, jobs and processes",
    long_about = "Prometheus exporter for BOSH director deployments, jobs and processes.\n\n\
                  Reads the deployment topology from a BOSH director, exposes release, stemcell, \
                  job vitals and process metrics, and writes a Prometheus file-based service \
                  discovery document listing the instances running each process.",
    version,
    propagate_version = true
)]
pub struct Args {
    /// BOSH director URL
    #[arg(long, env = "BOSH_EXPORTER_BOSH_URL")]
    pub bosh_url: Option<String>,

    /// BOSH username (basic auth or UAA password grant)
    #[arg(long, env = "BOSH_EXPORTER_BOSH_USERNAME")]
    pub bosh_username: Option<String>,

    /// BOSH password (basic auth or UAA password grant)
    #[arg(long, env = "BOSH_EXPORTER_BOSH_PASSWORD", hide_env_values = true)]
    pub bosh_password: Option<String>,

    /// UAA client id
    #[arg(long, env = "BOSH_EXPORTER_BOSH_UAA_CLIENT_ID")]
    pub bosh_uaa_client_id: Option<String>,

    /// UAA client secret
    #[arg(long, env = "BOSH_EXPORTER_BOSH_UAA_CLIENT_SECRET", hide_env_values = true)]
    pub bosh_uaa_client_secret: Option<String>,

    /// Public UAA client used for the password grant
    #[arg(long, env = "BOSH_EXPORTER_BOSH_UAA_DEFAULT_CLIENT")]
    pub bosh_uaa_default_client: Option<String>,

    /// Log level of the director and UAA clients
    #[arg(long, value_enum, env = "BOSH_EXPORTER_BOSH_LOG_LEVEL", default_value = "error")]
    pub bosh_log_level: LogLevel,

    /// BOSH CA certificate file (PEM)
    #[arg(long, env = "BOSH_EXPORTER_BOSH_CA_CERT_FILE")]
    pub bosh_ca_cert_file: Option<PathBuf>,

    /// Timeout in seconds for director and UAA requests and task polling
    #[arg(long, env = "BOSH_EXPORTER_BOSH_TIMEOUT_SECS")]
    pub bosh_timeout_secs: Option<u64>,

    /// Only collect these deployments (comma-separated)
    #[arg(long, env = "BOSH_EXPORTER_FILTER_DEPLOYMENTS")]
    pub filter_deployments: Option<String>,

    /// Only collect instances in these availability zones (comma-separated)
    #[arg(long, env = "BOSH_EXPORTER_FILTER_AZS")]
    pub filter_azs: Option<String>,

    /// Only run these collectors: Deployments, Jobs, ServiceDiscovery (comma-separated)
    #[arg(long, env = "BOSH_EXPORTER_FILTER_COLLECTORS")]
    pub filter_collectors: Option<String>,

    /// Metrics namespace
    #[arg(long, env = "BOSH_EXPORTER_METRICS_NAMESPACE")]
    pub metrics_namespace: Option<String>,

    /// Value of the `environment` label on every metric
    #[arg(long, env = "BOSH_EXPORTER_METRICS_ENVIRONMENT")]
    pub metrics_environment: Option<String>,

    /// Service discovery output file
    #[arg(long, env = "BOSH_EXPORTER_SD_FILENAME")]
    pub sd_filename: Option<PathBuf>,

    /// Only include processes matching this regexp in service discovery
    #[arg(long, env = "BOSH_EXPORTER_SD_PROCESSES_REGEXP")]
    pub sd_processes_regexp: Option<String>,

    /// Address to listen on for the web interface and telemetry
    #[arg(long, env = "BOSH_EXPORTER_WEB_LISTEN_ADDRESS")]
    pub web_listen_address: Option<String>,

    /// Path under which to expose metrics
    #[arg(long, env = "BOSH_EXPORTER_WEB_TELEMETRY_PATH")]
    pub web_telemetry_path: Option<String>,

    /// Username for web interface basic auth
    #[arg(long, env = "BOSH_EXPORTER_WEB_AUTH_USERNAME")]
    pub web_auth_username: Option<String>,

    /// Password for web interface basic auth
    #[arg(long, env = "BOSH_EXPORTER_WEB_AUTH_PASSWORD", hide_env_values = true)]
    pub web_auth_password: Option<String>,

    /// TLS certificate file for the web interface (PEM)
    #[arg(long, env = "BOSH_EXPORTER_WEB_TLS_CERTFILE")]
    pub web_tls_cert_file: Option<PathBuf>,

    /// TLS private key file for the web interface (PEM)
    #[arg(long, env = "BOSH_EXPORTER_WEB_TLS_KEYFILE")]
    pub web_tls_key_file: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, env = "BOSH_EXPORTER_LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "bosh-exporter",
            "--bosh-url",
            "https://10.0.0.6:25555",
            "--filter-collectors",
            "Jobs,Deployments",
            "--bosh-log-level",
            "debug",
            "--no-config",
        ])
        .unwrap();
        assert_eq!(args.bosh_url.as_deref(), Some("https://10.0.0.6:25555"));
        assert_eq!(args.filter_collectors.as_deref(), Some("Jobs,Deployments"));
        assert!(matches!(args.bosh_log_level, LogLevel::Debug));
        assert!(matches!(args.log_level, LogLevel::Info));
        assert!(args.no_config);
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let result = Args::try_parse_from(["bosh-exporter", "--log-level", "loud"]);
        assert!(result.is_err());
    }
}
