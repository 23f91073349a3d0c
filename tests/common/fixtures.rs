//! Test fixtures for common test data
//!
//! Callers for a small two-organization platform.

use uuid::Uuid;

use keybroker::models::{Caller, CallerRole, SaveKeyRequest, VisibilityScope};

/// Fixed UUIDs for testing (reproducible tests)
pub mod ids {
    use uuid::Uuid;

    pub const ACME_ORG_ID: Uuid = Uuid::from_u128(0x0a0a0a0a_0000_4000_8000_00000000ac3e);
    pub const GLOBEX_ORG_ID: Uuid = Uuid::from_u128(0x0b0b0b0b_0000_4000_8000_0000000910be);
    pub const ROOT_ID: Uuid = Uuid::from_u128(0x10000000_0000_4000_8000_000000000001);
}

/// Caller fixtures
pub struct CallerFixtures;

impl CallerFixtures {
    /// Platform operator without an organization
    pub fn super_admin() -> Caller {
        Caller::new(ids::ROOT_ID, CallerRole::SuperAdmin, None)
    }

    /// Administrator of ACME
    pub fn acme_admin() -> Caller {
        Caller::new(Uuid::new_v4(), CallerRole::OrgAdmin, Some(ids::ACME_ORG_ID))
    }

    /// Regular ACME member
    pub fn acme_user() -> Caller {
        Caller::new(Uuid::new_v4(), CallerRole::User, Some(ids::ACME_ORG_ID))
    }

    /// Administrator of Globex
    pub fn globex_admin() -> Caller {
        Caller::new(Uuid::new_v4(), CallerRole::OrgAdmin, Some(ids::GLOBEX_ORG_ID))
    }

    /// Regular Globex member
    pub fn globex_user() -> Caller {
        Caller::new(Uuid::new_v4(), CallerRole::User, Some(ids::GLOBEX_ORG_ID))
    }
}

/// Save request for `service` with the given plaintext and scope
pub fn save_request(service: &str, key: &str, scope: VisibilityScope) -> SaveKeyRequest {
    SaveKeyRequest {
        service: service.to_string(),
        key: key.to_string(),
        name: None,
        scope: Some(scope),
    }
}
