//! Common test utilities and helpers
//!
//! This module provides shared test infrastructure including:
//! - Caller fixtures and signed tokens
//! - Mock key store and usage sink with failure injection
//! - Test database setup
//! - API test client

pub mod fixtures;
pub mod test_app;

pub use fixtures::*;
pub use mocks::*;
pub use test_app::*;
