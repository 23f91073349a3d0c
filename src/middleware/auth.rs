//! JWT authentication middleware
//!
//! Turns an `Authorization: Bearer <jwt>` header into a verified [`Caller`].
//! The broker core never sees tokens, only the resulting caller.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Caller, CallerRole};
use crate::utils::error::{ErrorKind, ErrorResponse};
use crate::AppState;

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (caller ID)
    pub sub: String,
    /// Role name (`super_admin`, `org_admin` or `user`)
    #[serde(default)]
    pub role: String,
    /// Organization the caller belongs to
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Not before timestamp
    pub nbf: i64,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl TryFrom<Claims> for Caller {
    type Error = &'static str;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid caller ID in token")?;
        let organization_id = match claims.organization_id.as_deref() {
            Some(org) if !org.is_empty() => {
                Some(Uuid::parse_str(org).map_err(|_| "Invalid organization ID in token")?)
            }
            _ => None,
        };

        Ok(Caller::new(id, CallerRole::from_claim(&claims.role), organization_id))
    }
}

/// Extractor for the authenticated caller
///
/// Requires `auth_middleware` to have run for the route.
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Create a new JWT access token
pub fn create_access_token(
    caller_id: &Uuid,
    role: CallerRole,
    organization_id: Option<&Uuid>,
    secret: &str,
    expiry_hours: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: caller_id.to_string(),
        role: role.as_str().to_string(),
        organization_id: organization_id.map(|o| o.to_string()),
        iat: now.timestamp(),
        exp: exp.timestamp(),
        nbf: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate and decode a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<TokenData<Claims>, AuthError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })
}

/// Authentication error types
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    TokenExpired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "Missing authentication token",
            AuthError::InvalidToken => "Invalid authentication token",
            AuthError::TokenExpired => "Authentication token has expired",
        };

        let body = ErrorResponse::new(ErrorKind::Unauthenticated.as_str(), message);
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware
///
/// Validates the bearer token and injects the resulting [`Caller`] into
/// request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = extract_bearer_token(auth_header).ok_or(AuthError::InvalidToken)?;
    let token_data = validate_token(token, &state.config.auth.jwt_secret)?;
    let caller: Caller = token_data
        .claims
        .try_into()
        .map_err(|_| AuthError::InvalidToken)?;

    debug!(caller_id = %caller.id, role = %caller.role, "Caller authenticated");

    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}
