//! Shared utilities

pub mod error;
pub mod response;
pub mod validation;

pub use error::{AppError, AppResult, ErrorKind, ErrorResponse};
pub use response::ApiResponse;
