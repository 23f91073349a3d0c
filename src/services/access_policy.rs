//! Access policy for provider keys
//!
//! Pure functions over a [`Caller`] and [`KeyRecord`]s. The visibility rules
//! are expressed as a [`VisibilityFilter`] value so the same predicate can be
//! evaluated in-process and compiled to the key store's query language.

use uuid::Uuid;

use crate::models::{Caller, CallerRole, KeyRecord, VisibilityScope};

/// One disjunct of a visibility filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityClause {
    /// `owner_id == id`
    OwnedBy(Uuid),
    /// `organization_id == organization_id AND scope IN scopes`
    SharedWithOrganization {
        organization_id: Uuid,
        scopes: Vec<VisibilityScope>,
    },
    /// `organization_id IS NULL AND scope == platform`
    Platform,
}

impl VisibilityClause {
    pub fn matches(&self, record: &KeyRecord) -> bool {
        match self {
            VisibilityClause::OwnedBy(owner_id) => record.owner_id == *owner_id,
            VisibilityClause::SharedWithOrganization {
                organization_id,
                scopes,
            } => {
                record.organization_id == Some(*organization_id) && scopes.contains(&record.scope)
            }
            VisibilityClause::Platform => {
                record.organization_id.is_none() && record.scope == VisibilityScope::Platform
            }
        }
    }
}

/// Which key records a caller may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityFilter {
    /// Every record
    Unrestricted,
    /// Records matching at least one clause
    AnyOf(Vec<VisibilityClause>),
}

impl VisibilityFilter {
    pub fn matches(&self, record: &KeyRecord) -> bool {
        match self {
            VisibilityFilter::Unrestricted => true,
            VisibilityFilter::AnyOf(clauses) => clauses.iter().any(|c| c.matches(record)),
        }
    }
}

/// Capability flags reported alongside key listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCapabilities {
    pub can_create_platform: bool,
    pub can_create_organization: bool,
}

impl KeyCapabilities {
    pub fn for_caller(caller: &Caller) -> Self {
        Self {
            can_create_platform: role_may_create(caller.role, VisibilityScope::Platform),
            can_create_organization: role_may_create(caller.role, VisibilityScope::Organization),
        }
    }
}

/// Build the visibility filter for a caller
pub fn visibility_filter(caller: &Caller) -> VisibilityFilter {
    match caller.role {
        CallerRole::SuperAdmin => VisibilityFilter::Unrestricted,
        CallerRole::OrgAdmin => {
            let mut clauses = Vec::with_capacity(2);
            if let Some(organization_id) = caller.organization_id {
                clauses.push(VisibilityClause::SharedWithOrganization {
                    organization_id,
                    scopes: vec![
                        VisibilityScope::Private,
                        VisibilityScope::Organization,
                        VisibilityScope::Platform,
                    ],
                });
            }
            clauses.push(VisibilityClause::Platform);
            VisibilityFilter::AnyOf(clauses)
        }
        CallerRole::User => {
            let mut clauses = Vec::with_capacity(3);
            clauses.push(VisibilityClause::OwnedBy(caller.id));
            if let Some(organization_id) = caller.organization_id {
                clauses.push(VisibilityClause::SharedWithOrganization {
                    organization_id,
                    scopes: vec![VisibilityScope::Organization, VisibilityScope::Platform],
                });
            }
            clauses.push(VisibilityClause::Platform);
            VisibilityFilter::AnyOf(clauses)
        }
    }
}

/// Whether the caller may manage (re-scope or delete) an existing record
///
/// Allowed for the owner, any super admin, and the org admin of the record's
/// organization.
pub fn can_manage(caller: &Caller, record: &KeyRecord) -> bool {
    if caller.id == record.owner_id || caller.is_super_admin() {
        return true;
    }

    caller.is_org_admin()
        && record.organization_id.is_some()
        && record.organization_id == caller.organization_id
}

/// Whether the caller may put a key into `target` scope
///
/// With `existing`, the caller must also be allowed to manage that record.
pub fn can_set_scope(caller: &Caller, target: VisibilityScope, existing: Option<&KeyRecord>) -> bool {
    if !role_may_create(caller.role, target) {
        return false;
    }

    match existing {
        Some(record) => can_manage(caller, record),
        None => true,
    }
}

fn role_may_create(role: CallerRole, scope: VisibilityScope) -> bool {
    match scope {
        VisibilityScope::Platform => role == CallerRole::SuperAdmin,
        VisibilityScope::Organization => {
            matches!(role, CallerRole::SuperAdmin | CallerRole::OrgAdmin)
        }
        VisibilityScope::Private => true,
    }
}
