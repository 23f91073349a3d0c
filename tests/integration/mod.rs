//! Integration tests for keybroker
//!
//! These tests verify the behavior of the API endpoints and the broker core
//! against a real (temporary file) SQLite database.

mod api_tests;
