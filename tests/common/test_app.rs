//! Test application setup utilities
//!
//! Provides utilities for setting up test instances of the application
//! backed by a throwaway SQLite database.

use axum::{body::Body, http::Request, Router};
use tower::ServiceExt;
use uuid::Uuid;

use keybroker::{
    api,
    config::{
        AppConfig, AuthConfig, DatabaseConfig, EncryptionConfig, LoggingConfig, ServerConfig,
    },
    db,
    middleware::create_access_token,
    models::Caller,
    AppState,
};

pub const TEST_JWT_SECRET: &str = "test_secret_key_that_is_at_least_32_bytes_long";
pub const TEST_ENCRYPTION_SECRET: &str = "integration-test-encryption-secret";

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Create a new test application with a temporary SQLite database
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Create a new test application with custom configuration
    pub async fn with_config(config: AppConfig) -> Self {
        let db = db::init_pool(&config.database)
            .await
            .expect("Failed to initialize test database");

        let state = AppState::new(config, db);
        let router = api::create_router(state.clone());

        Self { router, state }
    }

    /// Signed bearer token for `caller`
    pub fn token_for(&self, caller: &Caller) -> String {
        generate_test_token(caller, &self.state.config.auth.jwt_secret)
    }

    /// Make a GET request to the test application
    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send("GET", uri, None, token).await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        token: Option<&str>,
    ) -> TestResponse {
        self.send("POST", uri, Some(body.to_string()), token).await
    }

    /// Make a PATCH request with JSON body
    pub async fn patch_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        token: Option<&str>,
    ) -> TestResponse {
        self.send("PATCH", uri, Some(body.to_string()), token).await
    }

    /// Make a POST request with a raw (possibly malformed) body
    pub async fn post_raw(&self, uri: &str, body: &str, token: Option<&str>) -> TestResponse {
        self.send("POST", uri, Some(body.to_string()), token).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send("DELETE", uri, None, token).await
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<String>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("Content-Type", "application/json");
        }
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let request = builder
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        self.request(request).await
    }

    /// Make an arbitrary request
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: bytes::Bytes,
}

impl TestResponse {
    /// Get the response body as a string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parse the response body as JSON
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    /// `data` of a success envelope
    pub fn data(&self) -> serde_json::Value {
        let body = self.json();
        assert_eq!(body["success"], true, "Expected success envelope: {}", self.text());
        body["data"].clone()
    }

    /// `error` kind of a failure envelope
    pub fn error_kind(&self) -> String {
        let body = self.json();
        assert_eq!(body["success"], false, "Expected failure envelope: {}", self.text());
        body["error"].as_str().unwrap_or_default().to_string()
    }

    /// Assert the response status
    pub fn assert_status(&self, expected: axum::http::StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    /// Assert the response status is OK (200)
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::OK)
    }

    /// Assert the response status is Created (201)
    pub fn assert_created(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CREATED)
    }

    /// Assert the response status is Bad Request (400)
    pub fn assert_bad_request(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::BAD_REQUEST)
    }

    /// Assert the response status is Unauthorized (401)
    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::UNAUTHORIZED)
    }

    /// Assert the response status is Forbidden (403)
    pub fn assert_forbidden(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::FORBIDDEN)
    }

    /// Assert the response status is Not Found (404)
    pub fn assert_not_found(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::NOT_FOUND)
    }
}

/// Database configuration for a unique temporary SQLite file
pub fn test_database_config() -> DatabaseConfig {
    // Use a unique temp file for each test to avoid conflicts
    let db_path = std::env::temp_dir().join(format!(
        "keybroker_test_{}.db",
        Uuid::new_v4().simple()
    ));

    DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", db_path.display()),
        max_connections: 1,
        min_connections: 1,
        connect_timeout_secs: 30,
        idle_timeout_secs: 600,
    }
}

/// Create a test configuration with temporary SQLite database
pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            tls: None,
        },
        database: test_database_config(),
        auth: AuthConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            token_expiry_hours: 1,
        },
        encryption: EncryptionConfig {
            secret: TEST_ENCRYPTION_SECRET.to_string(),
        },
        logging: LoggingConfig::default(),
    }
}

/// Generate a test JWT token for a caller
pub fn generate_test_token(caller: &Caller, secret: &str) -> String {
    create_access_token(
        &caller.id,
        caller.role,
        caller.organization_id.as_ref(),
        secret,
        1,
    )
    .expect("Failed to sign test token")
}
