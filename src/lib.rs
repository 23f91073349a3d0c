//! Keybroker library
//!
//! Credential broker for third-party API keys: keys are stored encrypted,
//! resolved per caller along the platform / organization / personal
//! hierarchy, and decrypted only for the single response that uses them.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{auth_middleware, Claims};
pub use services::KeyBroker;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Broker core
    pub broker: Arc<KeyBroker>,
}

impl AppState {
    /// Wire the broker over the SQLite key store and usage log
    pub fn new(config: AppConfig, db: DbPool) -> Self {
        let cipher = services::KeyCipher::from_secret(&config.encryption.secret);
        let broker = KeyBroker::new(
            cipher,
            Arc::new(db::SqliteKeyStore::new(db.clone())),
            Arc::new(db::SqliteUsageLog::new(db.clone())),
        );

        Self {
            config,
            db,
            broker: Arc::new(broker),
        }
    }
}
