//! Broker facade
//!
//! Owns the shared cipher, stores and background task tracker, and exposes
//! the six broker operations to the HTTP layer.

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::info;
use uuid::Uuid;

use crate::db::{KeyStore, UsageSink};
use crate::models::{
    Caller, ChangeScopeResponse, DeleteKeyResponse, KeyListing, KeySummary, RecordUsageRequest,
    RecordUsageResponse, ResolvedKey, SaveKeyRequest, VisibilityScope,
};
use crate::services::cipher::KeyCipher;
use crate::services::lifecycle::KeyLifecycle;
use crate::services::resolver::KeyResolver;
use crate::services::usage::UsageRecorder;
use crate::utils::error::{AppError, AppResult};

pub struct KeyBroker {
    resolver: KeyResolver,
    lifecycle: KeyLifecycle,
    usage: UsageRecorder,
    tracker: TaskTracker,
}

impl KeyBroker {
    pub fn new(cipher: KeyCipher, store: Arc<dyn KeyStore>, sink: Arc<dyn UsageSink>) -> Self {
        let cipher = Arc::new(cipher);
        let tracker = TaskTracker::new();
        let usage = UsageRecorder::new(sink, tracker.clone());

        Self {
            resolver: KeyResolver::new(
                Arc::clone(&store),
                Arc::clone(&cipher),
                usage.clone(),
                tracker.clone(),
            ),
            lifecycle: KeyLifecycle::new(store, cipher, usage.clone()),
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
        self.resolver.resolve(caller, service, preference).await
    }

    pub async fn save(&self, caller: &Caller, request: SaveKeyRequest) -> AppResult<KeySummary> {
        self.lifecycle.create(caller, request).await
    }

    pub async fn change_scope(
        &self,
        caller: &Caller,
        key_id: Uuid,
        scope: VisibilityScope,
    ) -> AppResult<ChangeScopeResponse> {
        self.lifecycle.change_scope(caller, key_id, scope).await
    }

    pub async fn list(&self, caller: &Caller, service: Option<&str>) -> AppResult<KeyListing> {
        self.lifecycle.list(caller, service).await
    }

    pub async fn delete(&self, caller: &Caller, key_id: Uuid) -> AppResult<DeleteKeyResponse> {
        self.lifecycle.delete(caller, key_id).await
    }

    /// Record a caller-reported usage event
    ///
    /// Only a blank service is rejected; sink failures are swallowed.
    pub async fn record_usage(
        &self,
        caller: &Caller,
        request: RecordUsageRequest,
    ) -> AppResult<RecordUsageResponse> {
        if request.service.trim().is_empty() {
            return Err(AppError::invalid_input("service is required"));
        }
        Ok(self.usage.record(caller, request).await)
    }

    /// Number of background bookkeeping tasks still running
    pub fn pending_background(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for all background bookkeeping spawned so far
    pub async fn drain_background(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
        info!("Background usage bookkeeping drained");
    }
}
