//! Broker core services

pub mod access_policy;
pub mod broker;
pub mod cipher;
pub mod lifecycle;
pub mod resolver;
pub mod usage;


pub use access_policy::{KeyCapabilities, VisibilityClause, VisibilityFilter};
pub use broker::KeyBroker;
pub use cipher::{DecryptError, KeyCipher};
pub use lifecycle::KeyLifecycle;
pub use resolver::KeyResolver;
pub use usage::UsageRecorder;
