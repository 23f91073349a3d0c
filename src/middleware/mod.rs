//! Middleware components
//!
//! This module contains middleware for:
//! - Authentication (JWT bearer tokens to callers)
//! - Security and cache-control headers

pub mod auth;
pub mod security_headers;

pub use auth::{auth_middleware, create_access_token, validate_token, AuthError, Claims};
pub use security_headers::{api_cache_control_middleware, security_headers_middleware};
