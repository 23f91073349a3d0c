//! Key resolution
//!
//! Picks exactly one key a caller may use for a service, decrypts it and
//! hands the plaintext back once. Usage bookkeeping for the chosen record
//! happens in the background and never affects the response.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::db::KeyStore;
use crate::models::{Caller, KeyRecord, RecordUsageRequest, ResolvedKey, VisibilityScope};
use crate::services::access_policy::visibility_filter;
use crate::services::cipher::KeyCipher;
use crate::services::usage::UsageRecorder;
use crate::utils::error::{AppError, AppResult};

/// Endpoint label for usage events emitted by resolution
pub const RESOLVE_ENDPOINT: &str = "resolve-key";

#[derive(Clone)]
pub struct KeyResolver {
    store: Arc<dyn KeyStore>,
    cipher: Arc<KeyCipher>,
    usage: UsageRecorder,
    tracker: TaskTracker,
}

impl KeyResolver {
    pub fn new(
        store: Arc<dyn KeyStore>,
        cipher: Arc<KeyCipher>,
        usage: UsageRecorder,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            store,
            cipher,
            usage,
            tracker,
        }
    }

    pub async fn resolve(
        &self,
        caller: &Caller,
        service: &str,
        preference: Option<VisibilityScope>,
    ) -> AppResult<ResolvedKey> {
        if service.trim().is_empty() {
            return Err(AppError::invalid_input("service is required"));
        }

        let filter = visibility_filter(caller);
        let candidates: Vec<KeyRecord> = self
            .store
            .find_active(service, &filter)
            .await?
            .into_iter()
            .filter(|record| record.active && record.service == service && filter.matches(record))
            .collect();

        debug!(
            service = %service,
            caller_id = %caller.id,
            candidates = candidates.len(),
            "Resolving key"
        );

        let Some(record) = select_key(candidates, caller, preference) else {
            return Err(not_found(caller, service));
        };

        let plaintext = match self.cipher.decrypt(&record.ciphertext) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                error!(
                    key_id = %record.id,
                    service = %service,
                    "Stored key failed to decrypt: {}",
                    e
                );
                return Err(e.into());
            }
        };

        info!(
            key_id = %record.id,
            service = %service,
            scope = %record.scope,
            caller_id = %caller.id,
            "Key resolved"
        );

        self.track_use(caller, &record);

        Ok(ResolvedKey {
            key_id: record.id,
            key: plaintext,
            scope: record.scope,
            name: record.name,
        })
    }

    fn track_use(&self, caller: &Caller, record: &KeyRecord) {
        let store = Arc::clone(&self.store);
        let usage = self.usage.clone();
        let caller = caller.clone();
        let key_id = record.id;
        let service = record.service.clone();

        self.tracker.spawn(async move {
            if let Err(e) = store.record_use(key_id, Utc::now()).await {
                warn!(key_id = %key_id, "Failed to update key usage counters: {}", e);
            }
            usage
                .record(
                    &caller,
                    RecordUsageRequest::operation(&service, Some(key_id), RESOLVE_ENDPOINT),
                )
                .await;
        });
    }
}

/// Rank eligible records and pick the winner
///
/// Broader scope wins; ties go to the newest record, then the lowest id.
/// A `platform` preference narrows the pool for super admins only.
pub fn select_key(
    candidates: Vec<KeyRecord>,
    caller: &Caller,
    preference: Option<VisibilityScope>,
) -> Option<KeyRecord> {
    let platform_only = caller.is_super_admin() && preference == Some(VisibilityScope::Platform);

    candidates
        .into_iter()
        .filter(|record| !platform_only || record.scope == VisibilityScope::Platform)
        .min_by(rank)
}

fn rank(a: &KeyRecord, b: &KeyRecord) -> Ordering {
    b.scope
        .cmp(&a.scope)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

fn not_found(caller: &Caller, service: &str) -> AppError {
    let message = format!("No {} key available", service);
    if caller.is_super_admin() {
        AppError::not_found_with_hint(
            message,
            format!(
                "No active {} key is configured. Add a platform key so every organization can use it.",
                service
            ),
        )
    } else {
        AppError::not_found_with_hint(
            message,
            format!(
                "No {} key is available to you. Ask an organization admin to share one, or add a personal key.",
                service
            ),
        )
    }
}
