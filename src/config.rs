//! Configuration management for bosh-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use bosh_exporter::auth::{AuthSettings, DEFAULT_UAA_CLIENT};
use bosh_exporter::filters::{split_list, CollectorsFilter, RegexpFilter};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9190";
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
pub const DEFAULT_NAMESPACE: &str = "bosh";
pub const DEFAULT_SD_FILENAME: &str = "bosh_target_groups.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const REDACTED: &str = "<redacted>";

/// Effective configuration. Every field is optional so a config file can
/// provide any subset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    // Director
    #[serde(alias = "bosh-url")]
    pub bosh_url: Option<String>,
    #[serde(alias = "bosh-username")]
    pub bosh_username: Option<String>,
    #[serde(alias = "bosh-password")]
    pub bosh_password: Option<String>,
    #[serde(alias = "bosh-uaa-client-id")]
    pub bosh_uaa_client_id: Option<String>,
    #[serde(alias = "bosh-uaa-client-secret")]
    pub bosh_uaa_client_secret: Option<String>,
    #[serde(alias = "bosh-uaa-default-client")]
    pub bosh_uaa_default_client: Option<String>,
    #[serde(alias = "bosh-ca-cert-file")]
    pub bosh_ca_cert_file: Option<PathBuf>,
    #[serde(alias = "bosh-timeout-secs")]
    pub bosh_timeout_secs: Option<u64>,

    // Filters
    #[serde(alias = "filter-deployments")]
    pub filter_deployments: Option<Vec<String>>,
    #[serde(alias = "filter-azs")]
    pub filter_azs: Option<Vec<String>>,
    #[serde(alias = "filter-collectors")]
    pub filter_collectors: Option<Vec<String>>,

    // Metrics
    #[serde(alias = "metrics-namespace")]
    pub metrics_namespace: Option<String>,
    #[serde(alias = "metrics-environment")]
    pub metrics_environment: Option<String>,

    // Service discovery
    #[serde(alias = "sd-filename")]
    pub sd_filename: Option<PathBuf>,
    #[serde(alias = "sd-processes-regexp")]
    pub sd_processes_regexp: Option<String>,

    // Web
    #[serde(alias = "web-listen-address")]
    pub web_listen_address: Option<String>,
    #[serde(alias = "web-telemetry-path")]
    pub web_telemetry_path: Option<String>,
    #[serde(alias = "web-auth-username")]
    pub web_auth_username: Option<String>,
    #[serde(alias = "web-auth-password")]
    pub web_auth_password: Option<String>,
    #[serde(alias = "web-tls-cert-file")]
    pub web_tls_cert_file: Option<PathBuf>,
    #[serde(alias = "web-tls-key-file")]
    pub web_tls_key_file: Option<PathBuf>,
}

impl Config {
    pub fn listen_address(&self) -> &str {
        self.web_listen_address
            .as_deref()
            .unwrap_or(DEFAULT_LISTEN_ADDRESS)
    }

    pub fn telemetry_path(&self) -> &str {
        self.web_telemetry_path
            .as_deref()
            .unwrap_or(DEFAULT_TELEMETRY_PATH)
    }

    pub fn namespace(&self) -> &str {
        self.metrics_namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn environment(&self) -> &str {
        self.metrics_environment.as_deref().unwrap_or("")
    }

    pub fn sd_filename(&self) -> PathBuf {
        self.sd_filename
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SD_FILENAME))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.bosh_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Basic auth credentials for the web interface, when both parts are set.
    pub fn web_auth(&self) -> Option<(String, String)> {
        match (
            self.web_auth_username.as_deref(),
            self.web_auth_password.as_deref(),
        ) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some((user.to_string(), pass.to_string()))
            }
            _ => None,
        }
    }

    /// TLS certificate and key, when both are set.
    pub fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.web_tls_cert_file, &self.web_tls_key_file) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    pub fn processes_filter(&self) -> Result<RegexpFilter, bosh_exporter::Error> {
        RegexpFilter::new(self.sd_processes_regexp.iter())
    }

    pub fn collectors_filter(&self) -> Result<CollectorsFilter, bosh_exporter::Error> {
        CollectorsFilter::new(self.filter_collectors.iter().flatten())
    }

    /// Credential inputs for the director session. `ca_cert` is the PEM content.
    pub fn auth_settings(&self, ca_cert: String) -> AuthSettings {
        AuthSettings {
            url: self.bosh_url.clone().unwrap_or_default(),
            username: self.bosh_username.clone().unwrap_or_default(),
            password: self.bosh_password.clone().unwrap_or_default(),
            uaa_client_id: self.bosh_uaa_client_id.clone().unwrap_or_default(),
            uaa_client_secret: self.bosh_uaa_client_secret.clone().unwrap_or_default(),
            default_uaa_client: self
                .bosh_uaa_default_client
                .clone()
                .unwrap_or_else(|| DEFAULT_UAA_CLIENT.to_string()),
            ca_cert,
            timeout: self.timeout(),
        }
    }

    /// Copy with every secret replaced, for display.
    pub fn redacted(&self) -> Config {
        let hide = |v: &Option<String>| v.as_ref().map(|_| REDACTED.to_string());
        Config {
            bosh_password: hide(&self.bosh_password),
            bosh_uaa_client_secret: hide(&self.bosh_uaa_client_secret),
            web_auth_password: hide(&self.web_auth_password),
            ..self.clone()
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn check_readable_file(path: &Path, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => {
            Err(format!("{} is empty: {}", what, path.display()).into())
        }
        Ok(meta) if !meta.is_file() => {
            Err(format!("{} is not a file: {}", what, path.display()).into())
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("{} not found: {}", what, path.display()).into())
        }
        Err(e) => Err(format!("{} is not readable: {} ({})", what, path.display(), e).into()),
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    // Director
    let url = non_empty(&cfg.bosh_url).ok_or("BOSH URL must be set (--bosh-url)")?;
    let parsed = url::Url::parse(url).map_err(|e| format!("Invalid BOSH URL '{}': {}", url, e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("BOSH URL '{}' must use http or https", url).into());
    }

    let ca_cert = cfg
        .bosh_ca_cert_file
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or("BOSH CA certificate file must be set (--bosh-ca-cert-file)")?;
    check_readable_file(ca_cert, "BOSH CA certificate file")?;

    if cfg.bosh_timeout_secs == Some(0) {
        return Err("BOSH timeout must be greater than zero".into());
    }

    // Metrics
    if non_empty(&cfg.metrics_environment).is_none() {
        return Err("Metrics environment must be set (--metrics-environment)".into());
    }
    let namespace_re = Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$")?;
    if !namespace_re.is_match(cfg.namespace()) {
        return Err(format!("Invalid metrics namespace '{}'", cfg.namespace()).into());
    }

    // Filters
    cfg.collectors_filter()?;
    cfg.processes_filter()?;

    // Web
    cfg.listen_address()
        .parse::<SocketAddr>()
        .map_err(|e| format!("Invalid listen address '{}': {}", cfg.listen_address(), e))?;
    if !cfg.telemetry_path().starts_with('/') || cfg.telemetry_path().len() < 2 {
        return Err(format!(
            "Telemetry path '{}' must start with '/' and not be the root path",
            cfg.telemetry_path()
        )
        .into());
    }

    // TLS validation
    match (&cfg.web_tls_cert_file, &cfg.web_tls_key_file) {
        (None, None) => {}
        (Some(_), None) => {
            return Err("TLS certificate file is set but TLS private key file is not".into());
        }
        (None, Some(_)) => {
            return Err("TLS private key file is set but TLS certificate file is not".into());
        }
        (Some(cert), Some(key)) => {
            check_readable_file(cert, "TLS certificate file")?;
            check_readable_file(key, "TLS private key file")?;
        }
    }

    Ok(())
}

fn list_arg(value: &Option<String>) -> Option<Vec<String>> {
    value.as_deref().map(split_list)
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI/env (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    macro_rules! override_with {
        ($($field:ident),* $(,)?) => {
            $(
                if let Some(value) = &args.$field {
                    config.$field = Some(value.clone());
                }
            )*
        };
    }

    override_with!(
        bosh_url,
        bosh_username,
        bosh_password,
        bosh_uaa_client_id,
        bosh_uaa_client_secret,
        bosh_uaa_default_client,
        bosh_ca_cert_file,
        bosh_timeout_secs,
        metrics_namespace,
        metrics_environment,
        sd_filename,
        sd_processes_regexp,
        web_listen_address,
        web_telemetry_path,
        web_auth_username,
        web_auth_password,
        web_tls_cert_file,
        web_tls_key_file,
    );

    // Comma-separated filter lists
    if let Some(list) = list_arg(&args.filter_deployments) {
        config.filter_deployments = Some(list);
    }
    if let Some(list) = list_arg(&args.filter_azs) {
        config.filter_azs = Some(list);
    }
    if let Some(list) = list_arg(&args.filter_collectors) {
        config.filter_collectors = Some(list);
    }

    Ok(config)
}

/// Loads a config file, trying the default locations when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            let defaults = [
                "/etc/bosh-exporter/config.yaml",
                "/etc/bosh-exporter/config.yml",
                "/etc/bosh-exporter/config.json",
                "./bosh-exporter.yaml",
                "./bosh-exporter.yml",
                "./bosh-exporter.json",
            ];

            match defaults.iter().map(Path::new).find(|p| p.exists()) {
                Some(p) => p.to_path_buf(),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Shows configuration in requested format, with secrets redacted
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let config = config.redacted();
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&config)?,
    };

    println!("{output}");
    Ok(())
}
