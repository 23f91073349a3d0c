//! Usage recorder
//!
//! Appends usage events to the configured [`UsageSink`]. Recording is
//! best-effort: sink failures are logged and swallowed so accounting can
//! never fail the operation that triggered it.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::UsageSink;
use crate::models::{Caller, RecordUsageRequest, RecordUsageResponse, UsageEvent};

#[derive(Clone)]
pub struct UsageRecorder {
    sink: Arc<dyn UsageSink>,
    tracker: TaskTracker,
}

impl UsageRecorder {
    pub fn new(sink: Arc<dyn UsageSink>, tracker: TaskTracker) -> Self {
        Self { sink, tracker }
    }

    /// Append one usage event, reporting success regardless of the sink outcome
    pub async fn record(&self, caller: &Caller, request: RecordUsageRequest) -> RecordUsageResponse {
        let event = build_event(caller, request);

        match self.sink.append(&event).await {
            Ok(()) => debug!(
                event_id = %event.id,
                service = %event.service,
                caller_id = %event.caller_id,
                "Usage event recorded"
            ),
            Err(e) => warn!(
                service = %event.service,
                caller_id = %event.caller_id,
                key_id = ?event.key_id,
                "Failed to record usage event: {}",
                e
            ),
        }

        RecordUsageResponse { recorded: true }
    }

    /// Same as [`record`](Self::record) but runs on the background tracker
    pub fn record_detached(&self, caller: &Caller, request: RecordUsageRequest) {
        let recorder = self.clone();
        let caller = caller.clone();
        self.tracker.spawn(async move {
            recorder.record(&caller, request).await;
        });
    }
}

fn build_event(caller: &Caller, request: RecordUsageRequest) -> UsageEvent {
    UsageEvent {
        id: Uuid::new_v4(),
        key_id: request.key_id,
        caller_id: caller.id,
        organization_id: caller.organization_id,
        service: request.service,
        endpoint: request.endpoint,
        input_tokens: request.input_tokens,
        output_tokens: request.output_tokens,
        cost_usd: request.cost_usd,
        metadata: request
            .metadata
            .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
        created_at: Utc::now(),
    }
}
