//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings except production secrets

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Placeholder encryption secret shipped in the default configuration
const DEFAULT_ENCRYPTION_SECRET: &str = "change-me-in-production-32-bytes";

/// Placeholder JWT secret shipped in the default configuration. Anyone can
/// sign tokens with it, so it is rejected at startup.
const DEFAULT_JWT_SECRET: &str = "change-me-in-production-minimum-32-characters-long";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// TLS/HTTPS configuration (if not set, server runs HTTP)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to TLS certificate file (PEM format)
    pub cert_file: PathBuf,
    /// Path to TLS private key file (PEM format)
    pub key_file: PathBuf,
    /// Minimum TLS version (1.2 or 1.3)
    #[serde(default = "default_min_tls_version")]
    pub min_version: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8750
}

fn default_min_tls_version() -> String {
    "1.3".to_string()
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
    /// Lifetime of tokens issued with `--issue-token`
    #[serde(default = "default_token_expiry")]
    pub token_expiry_hours: u64,
}

fn default_token_expiry() -> u64 {
    24
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Key encryption configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncryptionConfig {
    /// Secret the cipher key is derived from (truncated or padded to 32 bytes)
    #[serde(default = "default_encryption_secret")]
    pub secret: String,
}

fn default_encryption_secret() -> String {
    DEFAULT_ENCRYPTION_SECRET.to_string()
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            secret: default_encryption_secret(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix (default: "keybroker")
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Enable daily log rotation
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to console (stdout/stderr) - default for development
    #[default]
    Console,
    /// Log to file with optional rotation - recommended for production
    File,
    /// Log to both console and file
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/keybroker")
}

fn default_log_prefix() -> String {
    "keybroker".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                tls: None,
            },
            auth: AuthConfig {
                jwt_secret: DEFAULT_JWT_SECRET.to_string(),
                token_expiry_hours: default_token_expiry(),
            },
            database: DatabaseConfig {
                url: "sqlite://./data/keybroker.db".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            encryption: EncryptionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("KEYBROKER_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                Self::from_file(path)?
            }
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => {
                eprintln!("[CONFIG] No config file found, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a YAML configuration file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            // Current directory
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            // System config directory
            PathBuf::from("/etc/keybroker/config.yaml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("keybroker/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Server overrides
        if let Ok(host) = std::env::var("KEYBROKER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("KEYBROKER_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        // Database overrides
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }

        // Secrets
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(secret) = std::env::var("KEYBROKER_ENCRYPTION_KEY") {
            self.encryption.secret = secret;
        }

        // Logging overrides
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("KEYBROKER_LOG_FORMAT") {
            self.logging.format = parse_log_format(&format);
        }

        // Server TLS overrides
        if let Ok(cert) = std::env::var("KEYBROKER_TLS_CERT") {
            let key = std::env::var("KEYBROKER_TLS_KEY").unwrap_or_default();
            if !key.is_empty() {
                self.server.tls = Some(TlsConfig {
                    cert_file: PathBuf::from(cert),
                    key_file: PathBuf::from(key),
                    min_version: std::env::var("KEYBROKER_TLS_MIN_VERSION")
                        .unwrap_or_else(|_| default_min_tls_version()),
                });
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Validate JWT secret length
        if self.auth.jwt_secret.len() < 32 {
            anyhow::bail!("JWT secret must be at least 32 characters long");
        }
        if self.auth.jwt_secret == DEFAULT_JWT_SECRET {
            anyhow::bail!(
                "JWT secret is the shipped placeholder; set auth.jwt_secret or JWT_SECRET"
            );
        }

        if self.encryption.secret.is_empty() {
            anyhow::bail!("Encryption secret cannot be empty");
        }

        // Validate port
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        // Validate database URL
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        // Validate TLS configuration if present
        if let Some(ref tls) = self.server.tls {
            if !tls.cert_file.exists() {
                anyhow::bail!("TLS certificate file not found: {:?}", tls.cert_file);
            }
            if !tls.key_file.exists() {
                anyhow::bail!("TLS key file not found: {:?}", tls.key_file);
            }
            if tls.min_version != "1.2" && tls.min_version != "1.3" {
                anyhow::bail!(
                    "Invalid TLS minimum version: {}. Must be '1.2' or '1.3'",
                    tls.min_version
                );
            }
        }

        Ok(())
    }

    /// Weak but accepted settings, reported once logging is up
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.encryption.secret == DEFAULT_ENCRYPTION_SECRET {
            warnings.push(
                "Stored keys are sealed with the default encryption secret; set KEYBROKER_ENCRYPTION_KEY"
                    .to_string(),
            );
        } else if self.encryption.secret.len() < 32 {
            warnings.push(
                "Encryption secret is shorter than 32 bytes and will be padded; use a longer secret"
                    .to_string(),
            );
        }
        warnings
    }

    /// Create a default configuration file
    pub fn create_default_config(path: &PathBuf) -> Result<()> {
        let config = AppConfig::default();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_norway::to_string(&config)?;
        std::fs::write(path, yaml)?;

        Ok(())
    }
}

fn parse_log_format(value: &str) -> LogFormat {
    match value.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        "compact" => LogFormat::Compact,
        _ => LogFormat::Pretty,
    }
}
