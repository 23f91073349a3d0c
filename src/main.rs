//! Keybroker - credential broker for third-party API keys
//!
//! Stores provider keys encrypted at rest and hands them out, one response
//! at a time, to callers entitled to use them.

use std::env;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum_server::Handle;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing::{info, warn};
use uuid::Uuid;

use config::LogFormat;
use keybroker::{api, config, db, middleware, models::CallerRole, AppConfig, AppState};

/// Time allowed for in-flight requests once shutdown starts
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    // Check for --help flag
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    // Check for --version flag
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("keybroker {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if let Some(pos) = args.iter().position(|arg| arg == "--init-config") {
        let path = args
            .get(pos + 1)
            .map(std::path::PathBuf::from)
            .context("--init-config requires a path")?;
        AppConfig::create_default_config(&path)
            .with_context(|| format!("Failed to write {:?}", path))?;
        println!("Wrote default configuration to {}", path.display());
        println!("Set auth.jwt_secret and encryption.secret before starting the server.");
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    if let Some(pos) = args.iter().position(|arg| arg == "--issue-token") {
        return issue_token(&config, &args[pos + 1..]);
    }

    // The guard must be kept alive for the duration of the program
    // to ensure log messages are flushed to files
    let _log_guard = init_logging(&config);

    info!("keybroker {} starting up", env!("CARGO_PKG_VERSION"));
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    ensure_data_directory(&config)?;

    info!("Initializing database connection");
    let db = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    let state = AppState::new(config.clone(), db);
    let broker = Arc::clone(&state.broker);
    let app = api::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    if let Some(ref tls_config) = config.server.tls {
        info!("Starting HTTPS server on https://{}", addr);
        info!("TLS certificate: {:?}", tls_config.cert_file);
        info!("TLS minimum version: {}", tls_config.min_version);

        let rustls_config = create_rustls_config(tls_config).await?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("Failed to bind to address")?;

        let handle = Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        info!("HTTPS server is ready to accept connections");

        axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)?
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .context("HTTPS server error")?;
    } else {
        info!("Starting HTTP server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("Failed to bind to address")?;

        info!("HTTP server is ready to accept connections");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    }

    info!(
        pending = broker.pending_background(),
        "Server stopped, waiting for usage bookkeeping"
    );
    broker.drain_background().await;

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Print a signed access token for `<caller-id> <role> [organization-id]`
fn issue_token(config: &AppConfig, args: &[String]) -> Result<()> {
    let caller_id = args
        .first()
        .context("--issue-token requires a caller id")
        .and_then(|id| Uuid::parse_str(id).context("Invalid caller id"))?;
    let role = args
        .get(1)
        .map(|r| CallerRole::from_claim(r))
        .context("--issue-token requires a role")?;
    let organization_id = args
        .get(2)
        .map(|o| Uuid::parse_str(o).context("Invalid organization id"))
        .transpose()?;

    let token = middleware::create_access_token(
        &caller_id,
        role,
        organization_id.as_ref(),
        &config.auth.jwt_secret,
        config.auth.token_expiry_hours,
    )
    .context("Failed to sign access token")?;

    println!("{}", token);
    Ok(())
}

/// rustls server config for the configured certificate, key and minimum version
async fn create_rustls_config(
    tls_config: &config::TlsConfig,
) -> Result<axum_server::tls_rustls::RustlsConfig> {
    use axum_server::tls_rustls::RustlsConfig;
    use rustls::{crypto::aws_lc_rs::default_provider, version, ServerConfig};

    let certs = load_certificates(&tls_config.cert_file)?;
    let key = load_private_key(&tls_config.key_file)?;

    let versions: &[&'static rustls::SupportedProtocolVersion] =
        if tls_config.min_version == "1.3" {
            &[&version::TLS13]
        } else {
            &[&version::TLS12, &version::TLS13]
        };

    let mut server_config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_protocol_versions(versions)
        .context("Unsupported TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("Failed to build TLS server config")?;
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(RustlsConfig::from_config(Arc::new(server_config)))
}

fn load_certificates(
    path: &std::path::Path,
) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open certificate file: {:?}", path))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse certificates in {:?}", path))?;

    if certs.is_empty() {
        anyhow::bail!("No certificates found in {:?}", path);
    }
    Ok(certs)
}

fn load_private_key(path: &std::path::Path) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open key file: {:?}", path))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .with_context(|| format!("Failed to read private key: {:?}", path))?
        .with_context(|| format!("No private key found in {:?}", path))
}

type BoxedLayer = Box<dyn tracing_subscriber::Layer<tracing_subscriber::Registry> + Send + Sync>;

/// Install the global subscriber; the returned guard flushes file output on drop
fn init_logging(config: &AppConfig) -> Option<WorkerGuard> {
    use config::LogTarget;
    use tracing_subscriber::{prelude::*, EnvFilter};

    let logging = &config.logging;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if matches!(logging.target, LogTarget::Console | LogTarget::Both) {
        layers.push(format_layer(&logging.format, std::io::stdout));
    }
    if matches!(logging.target, LogTarget::File | LogTarget::Both) {
        let (writer, file_guard) = create_file_writer(logging);
        layers.push(format_layer(&logging.format, writer));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    guard
}

/// Formatting layer for one output
fn format_layer<W>(format: &LogFormat, writer: W) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    use tracing_subscriber::{fmt, Layer};

    let layer = fmt::layer().with_writer(writer);
    match format {
        LogFormat::Json => layer.json().with_target(true).boxed(),
        LogFormat::Compact => layer.compact().with_target(false).boxed(),
        LogFormat::Pretty => layer
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
    }
}

/// Non-blocking writer into `log_dir`, rotated daily when configured
fn create_file_writer(log_config: &config::LoggingConfig) -> (NonBlocking, WorkerGuard) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: could not create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(appender)
}

/// Ensure the data directory exists
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if let Some(parent) = sqlite_parent_dir(&config.database.url) {
        if !parent.exists() {
            std::fs::create_dir_all(&parent).context("Failed to create data directory")?;
            info!("Created data directory: {:?}", parent);
        }
    }
    Ok(())
}

/// Directory holding the SQLite file named by a `sqlite://` URL
fn sqlite_parent_dir(url: &str) -> Option<std::path::PathBuf> {
    let path = url.strip_prefix("sqlite://")?;
    let path = path.split('?').next()?;
    let parent = std::path::Path::new(path).parent()?;
    if parent.as_os_str().is_empty() {
        None
    } else {
        Some(parent.to_path_buf())
    }
}

/// Print help message
fn print_help() {
    println!(
        r#"keybroker {}

USAGE:
    keybroker [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    --init-config <PATH>    Write a configuration file with default values
    --issue-token <CALLER_ID> <ROLE> [ORGANIZATION_ID]
                            Print a signed access token using the configured
                            JWT secret. ROLE is super_admin, org_admin or user.

ENVIRONMENT:
    KEYBROKER_CONFIG            Path to configuration file
    KEYBROKER_ENCRYPTION_KEY    Secret used to encrypt stored keys
    JWT_SECRET                  Secret used to verify bearer tokens
    DATABASE_URL                SQLite database URL

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by KEYBROKER_CONFIG environment variable
    2. ./config.yaml, ./config/config.yaml
    3. /etc/keybroker/config.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}
