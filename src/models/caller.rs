//! Caller identity model
//!
//! A `Caller` is produced by the identity collaborator (see
//! `middleware::auth`) and consumed by the broker core as already verified.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a verified caller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    /// Platform operator; sees every key
    SuperAdmin,
    /// Administrator of a single organization
    OrgAdmin,
    /// Regular member
    User,
}

impl CallerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallerRole::SuperAdmin => "super_admin",
            CallerRole::OrgAdmin => "org_admin",
            CallerRole::User => "user",
        }
    }

    /// Map a role claim to a role. Unknown names are treated as `User`.
    pub fn from_claim(value: &str) -> Self {
        match value {
            "super_admin" | "superadmin" => CallerRole::SuperAdmin,
            "org_admin" | "admin" => CallerRole::OrgAdmin,
            _ => CallerRole::User,
        }
    }
}

impl std::fmt::Display for CallerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: CallerRole,
    /// `None` is only expected for super admins
    pub organization_id: Option<Uuid>,
}

impl Caller {
    pub fn new(id: Uuid, role: CallerRole, organization_id: Option<Uuid>) -> Self {
        Self {
            id,
            role,
            organization_id,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == CallerRole::SuperAdmin
    }

    pub fn is_org_admin(&self) -> bool {
        self.role == CallerRole::OrgAdmin
    }
}
