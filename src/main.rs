//! bosh-exporter
//!
//! Prometheus exporter for BOSH directors with tracing logging.
//! This is the main entry point that resolves configuration, authenticates
//! against the director and serves the metrics endpoint.

mod cli;
mod config;
mod handlers;
mod metrics;
mod state;

use axum_server::tls_rustls::RustlsConfig;
use bosh_exporter::auth::{self, HttpClientFactory};
use bosh_exporter::collectors::{
    BoshCollector, DeploymentsCollector, JobsCollector, MetricsContext, ServiceDiscoveryCollector,
    SubCollector,
};
use bosh_exporter::deployments::Fetcher;
use bosh_exporter::filters::{AzsFilter, DeploymentsFilter};
use clap::Parser;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use cli::Args;
use config::{resolve_config, show_config, validate_effective_config, Config};
use handlers::router;
use metrics::ExporterMetrics;
use state::AppState;

/// Initializes tracing with the base level and the director client level.
fn setup_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let base = args.log_level.as_str();
    let bosh = args.bosh_log_level.as_str();
    let filter = EnvFilter::try_new(format!(
        "{base},bosh_exporter::director={bosh},bosh_exporter::auth={bosh}"
    ))?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        "Logging initialized with level: {:?} (director clients: {:?})",
        args.log_level, args.bosh_log_level
    );
    Ok(())
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    let config = load_validated_config(&args)?;
    setup_logging(&args)?;

    info!("Starting bosh-exporter {}", bosh_exporter::build_info::VERSION);

    // Director clients use ring while axum-server pulls in aws-lc-rs; pin one provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let ca_cert_path = config
        .bosh_ca_cert_file
        .clone()
        .ok_or("BOSH CA certificate file must be set")?;
    let ca_cert = std::fs::read_to_string(&ca_cert_path).map_err(|e| {
        format!(
            "Failed to read BOSH CA certificate file {}: {}",
            ca_cert_path.display(),
            e
        )
    })?;

    let settings = config.auth_settings(ca_cert);
    let factory = HttpClientFactory::new(&settings);
    let session = match auth::resolve(&settings, &factory).await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to authenticate against the BOSH director: {}", e);
            eprintln!("❌ Failed to authenticate against the BOSH director: {}", e);
            std::process::exit(1);
        }
    };

    let info = session.info().clone();
    info!("Using BOSH Director `{}` ({})", info.name, info.uuid);
    debug!("Director version {} using {:?} authentication", info.version, session.mode());

    let ctx = MetricsContext {
        namespace: config.namespace().to_string(),
        environment: config.environment().to_string(),
        bosh_name: info.name.clone(),
        bosh_uuid: info.uuid.clone(),
    };

    let fetcher = Fetcher::new(
        session.director(),
        DeploymentsFilter::new(config.filter_deployments.iter().flatten()),
        AzsFilter::new(config.filter_azs.iter().flatten()),
    );
    let sub_collectors: Vec<Box<dyn SubCollector>> = vec![
        Box::new(DeploymentsCollector::new(ctx.clone())?),
        Box::new(JobsCollector::new(ctx.clone())?),
        Box::new(ServiceDiscoveryCollector::new(
            ctx.clone(),
            config.sd_filename(),
            config.processes_filter()?,
        )?),
    ];
    let collector = BoshCollector::new(
        ctx,
        fetcher,
        sub_collectors,
        &config.collectors_filter()?,
    )?;

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    registry.register(Box::new(collector))?;
    let metrics = ExporterMetrics::new(&registry, config.namespace())?;
    debug!("All metrics registered successfully");

    let config = Arc::new(config);
    let state = Arc::new(AppState {
        registry,
        metrics,
        config: Arc::clone(&config),
        director_name: info.name,
        director_uuid: info.uuid,
        start_time: Instant::now(),
    });

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = config.listen_address().parse()?;
    let telemetry_path = config.telemetry_path();

    let app = router(state);

    if config.web_auth().is_some() {
        info!("Basic authentication enabled for {}", telemetry_path);
    }

    if let Some((cert_path, key_path)) = config.tls_files() {
        info!("Loading TLS certificate from: {}", cert_path.display());
        info!("Loading TLS private key from: {}", key_path.display());

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "bosh-exporter listening on https://{}{}",
            addr, telemetry_path
        );

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "bosh-exporter listening on http://{}{}",
            addr, telemetry_path
        );

        let server = axum::serve(listener, app);

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal => {
                info!("Shutdown signal received, exiting...");
            }
        }
    }

    info!("bosh-exporter stopped gracefully");
    Ok(())
}
