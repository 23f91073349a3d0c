//! Provider key models
//!
//! `KeyRecord` is the stored form and deliberately has no `Serialize`
//! implementation: only `KeySummary` and `ResolvedKey` ever leave the broker.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Number of trailing plaintext characters kept for display
pub const HINT_LENGTH: usize = 4;
/// Hint character used when the secret is too short to reveal any of it
const HINT_MASK: &str = "*";

/// Visibility tier of a key, ordered by reach
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityScope {
    /// Owner only (plus admins who manage it)
    #[default]
    Private,
    /// Everyone in the owning organization
    Organization,
    /// Every caller on the platform
    Platform,
}

impl VisibilityScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityScope::Private => "private",
            VisibilityScope::Organization => "organization",
            VisibilityScope::Platform => "platform",
        }
    }
}

impl fmt::Display for VisibilityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisibilityScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "private" => Ok(VisibilityScope::Private),
            "organization" => Ok(VisibilityScope::Organization),
            "platform" => Ok(VisibilityScope::Platform),
            other => Err(format!("unknown visibility scope: {}", other)),
        }
    }
}

/// Stored provider key
#[derive(Clone)]
pub struct KeyRecord {
    pub id: Uuid,
    pub service: String,
    /// base64(nonce || ciphertext || tag)
    pub ciphertext: String,
    pub hint: String,
    pub name: Option<String>,
    pub scope: VisibilityScope,
    pub organization_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
}

impl KeyRecord {
    /// Metadata view, safe to return to any caller that can see the record
    pub fn summary(&self) -> KeySummary {
        KeySummary {
            id: self.id,
            service: self.service.clone(),
            name: self.name.clone(),
            hint: self.hint.clone(),
            scope: self.scope,
            organization_id: self.organization_id,
            owner_id: self.owner_id,
            active: self.active,
            last_used_at: self.last_used_at,
            usage_count: self.usage_count,
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("id", &self.id)
            .field("service", &self.service)
            .field("ciphertext", &"[REDACTED]")
            .field("hint", &self.hint)
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("organization_id", &self.organization_id)
            .field("owner_id", &self.owner_id)
            .field("active", &self.active)
            .field("last_used_at", &self.last_used_at)
            .field("usage_count", &self.usage_count)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Key metadata returned by save and list operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeySummary {
    pub id: Uuid,
    pub service: String,
    pub name: Option<String>,
    pub hint: String,
    pub scope: VisibilityScope,
    pub organization_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of `list-keys`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyListing {
    pub keys: Vec<KeySummary>,
    pub can_create_platform: bool,
    pub can_create_organization: bool,
}

/// A decrypted key handed to exactly one authorized caller
#[derive(Clone, Serialize)]
pub struct ResolvedKey {
    pub key_id: Uuid,
    /// Plaintext secret
    pub key: String,
    pub scope: VisibilityScope,
    pub name: Option<String>,
}

impl fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("key_id", &self.key_id)
            .field("key", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ResolveKeyRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "service must be at most 100 characters"))]
    pub service: String,
    /// Advisory; only honoured for super admins asking for `platform`
    #[serde(default)]
    pub preference: Option<VisibilityScope>,
}

#[derive(Clone, Default, Deserialize, Validate)]
pub struct SaveKeyRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "service must be at most 100 characters"))]
    pub service: String,
    /// Plaintext secret
    #[serde(default)]
    #[validate(length(max = 4096, message = "key must be at most 4096 characters"))]
    pub key: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "name must be at most 255 characters"))]
    pub name: Option<String>,
    #[serde(default)]
    pub scope: Option<VisibilityScope>,
}

impl fmt::Debug for SaveKeyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveKeyRequest")
            .field("service", &self.service)
            .field("key", &"[REDACTED]")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeScopeRequest {
    pub scope: VisibilityScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeScopeResponse {
    pub id: Uuid,
    pub scope: VisibilityScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteKeyResponse {
    pub id: Uuid,
    pub deleted: bool,
}

/// Display hint: the last `HINT_LENGTH` characters of the plaintext
///
/// Secrets shorter than twice the hint length get a fully masked hint so the
/// hint never reveals most of the secret.
pub fn key_hint(plaintext: &str) -> String {
    let count = plaintext.chars().count();
    if count < HINT_LENGTH * 2 {
        return HINT_MASK.repeat(HINT_LENGTH);
    }
    plaintext.chars().skip(count - HINT_LENGTH).collect()
}
