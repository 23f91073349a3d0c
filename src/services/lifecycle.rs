//! Key lifecycle: create, re-scope, delete and list
//!
//! Every mutation is checked against the access policy before the key store
//! is touched.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{KeyPlacement, KeyStore, StoreError};
use crate::models::{
    key_hint, Caller, ChangeScopeResponse, DeleteKeyResponse, KeyListing, KeyRecord, KeySummary,
    RecordUsageRequest, SaveKeyRequest, VisibilityScope,
};
use crate::services::access_policy::{can_manage, can_set_scope, visibility_filter, KeyCapabilities};
use crate::services::cipher::KeyCipher;
use crate::services::usage::UsageRecorder;
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::{normalize_name, validate_secret, validate_service};

pub const SAVE_ENDPOINT: &str = "save-key";
pub const DELETE_ENDPOINT: &str = "delete-key";

/// Conditional writes retried after losing to a concurrent writer
const WRITE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct KeyLifecycle {
    store: Arc<dyn KeyStore>,
    cipher: Arc<KeyCipher>,
    usage: UsageRecorder,
}

impl KeyLifecycle {
    pub fn new(store: Arc<dyn KeyStore>, cipher: Arc<KeyCipher>, usage: UsageRecorder) -> Self {
        Self {
            store,
            cipher,
            usage,
        }
    }

    /// Encrypt and store a new key
    pub async fn create(&self, caller: &Caller, request: SaveKeyRequest) -> AppResult<KeySummary> {
        if request.service.trim().is_empty() {
            return Err(AppError::invalid_input("service is required"));
        }
        if !validate_service(&request.service) {
            return Err(AppError::invalid_input(
                "service may only contain letters, digits, '.', '_' and '-'",
            ));
        }
        if !validate_secret(&request.key) {
            return Err(AppError::invalid_input("key is required"));
        }

        let requested = request.scope.unwrap_or_default();
        if !can_set_scope(caller, requested, None) {
            warn!(
                caller_id = %caller.id,
                role = %caller.role,
                scope = %requested,
                "Key creation denied"
            );
            return Err(AppError::forbidden(format!(
                "Your role cannot create {} keys",
                requested
            )));
        }

        let (scope, organization_id) = placement(caller, requested);
        let ciphertext = self
            .cipher
            .encrypt(&request.key)
            .map_err(|e| AppError::internal(format!("Failed to encrypt key: {}", e)))?;

        let record = KeyRecord {
            id: Uuid::new_v4(),
            service: request.service,
            ciphertext,
            hint: key_hint(&request.key),
            name: normalize_name(request.name.as_deref()),
            scope,
            organization_id,
            owner_id: caller.id,
            active: true,
            last_used_at: None,
            usage_count: 0,
            created_at: Utc::now(),
        };

        self.store.insert(&record).await?;

        info!(
            key_id = %record.id,
            service = %record.service,
            scope = %record.scope,
            caller_id = %caller.id,
            "Key saved"
        );

        self.usage.record_detached(
            caller,
            RecordUsageRequest::operation(&record.service, Some(record.id), SAVE_ENDPOINT),
        );

        Ok(record.summary())
    }

    /// Move an existing key to another visibility scope
    ///
    /// The write only lands if the key still sits where it was when the
    /// caller was authorized; otherwise the key is re-read and re-checked.
    pub async fn change_scope(
        &self,
        caller: &Caller,
        key_id: Uuid,
        scope: VisibilityScope,
    ) -> AppResult<ChangeScopeResponse> {
        for _ in 0..WRITE_ATTEMPTS {
            let record = self.fetch(key_id).await?;

            if !can_set_scope(caller, scope, Some(&record)) {
                warn!(
                    caller_id = %caller.id,
                    role = %caller.role,
                    key_id = %key_id,
                    scope = %scope,
                    "Scope change denied"
                );
                return Err(AppError::forbidden(format!(
                    "You cannot move this key to {} scope",
                    scope
                )));
            }

            let organization_id = match scope {
                VisibilityScope::Platform => None,
                _ => record.organization_id.or(caller.organization_id),
            };
            if scope == VisibilityScope::Organization && organization_id.is_none() {
                return Err(AppError::invalid_input(
                    "An organization key needs an organization; neither the key nor the caller has one",
                ));
            }

            let target = KeyPlacement::new(scope, organization_id);
            if self
                .store
                .update_scope(key_id, KeyPlacement::of(&record), target)
                .await?
            {
                info!(
                    key_id = %key_id,
                    from = %record.scope,
                    to = %scope,
                    caller_id = %caller.id,
                    "Key scope changed"
                );
                return Ok(ChangeScopeResponse { id: key_id, scope });
            }

            debug!(key_id = %key_id, "Key moved during scope change, re-checking");
        }

        Err(StoreError::Conflict(key_id).into())
    }

    /// Permanently remove a key
    pub async fn delete(&self, caller: &Caller, key_id: Uuid) -> AppResult<DeleteKeyResponse> {
        for _ in 0..WRITE_ATTEMPTS {
            let record = self.fetch(key_id).await?;

            if !can_manage(caller, &record) {
                warn!(
                    caller_id = %caller.id,
                    role = %caller.role,
                    key_id = %key_id,
                    "Key deletion denied"
                );
                return Err(AppError::forbidden("You cannot delete this key"));
            }

            if self.store.delete(key_id, KeyPlacement::of(&record)).await? {
                info!(key_id = %key_id, service = %record.service, caller_id = %caller.id, "Key deleted");

                self.usage.record_detached(
                    caller,
                    RecordUsageRequest::operation(&record.service, Some(key_id), DELETE_ENDPOINT),
                );

                return Ok(DeleteKeyResponse {
                    id: key_id,
                    deleted: true,
                });
            }

            debug!(key_id = %key_id, "Key moved during deletion, re-checking");
        }

        Err(StoreError::Conflict(key_id).into())
    }

    /// Key metadata visible to the caller, newest first
    pub async fn list(&self, caller: &Caller, service: Option<&str>) -> AppResult<KeyListing> {
        let filter = visibility_filter(caller);
        let service = service.map(str::trim).filter(|s| !s.is_empty());

        let keys = self
            .store
            .list(&filter, service)
            .await?
            .iter()
            .filter(|record| filter.matches(record))
            .map(KeyRecord::summary)
            .collect();

        let capabilities = KeyCapabilities::for_caller(caller);
        Ok(KeyListing {
            keys,
            can_create_platform: capabilities.can_create_platform,
            can_create_organization: capabilities.can_create_organization,
        })
    }

    async fn fetch(&self, key_id: Uuid) -> AppResult<KeyRecord> {
        self.store
            .get(key_id)
            .await?
            .ok_or_else(|| AppError::not_found("Key not found"))
    }
}

/// Final scope and organization for a new key
///
/// Platform keys belong to no organization. A caller without an organization
/// can only hold private keys.
fn placement(caller: &Caller, requested: VisibilityScope) -> (VisibilityScope, Option<Uuid>) {
    match (requested, caller.organization_id) {
        (VisibilityScope::Platform, _) => (VisibilityScope::Platform, None),
        (VisibilityScope::Organization, None) => (VisibilityScope::Private, None),
        (scope, organization_id) => (scope, organization_id),
    }
}
