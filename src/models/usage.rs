//! Usage accounting models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Append-only usage record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageEvent {
    pub id: Uuid,
    pub key_id: Option<Uuid>,
    pub caller_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub service: String,
    pub endpoint: Option<String>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub cost_usd: Option<f64>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Body of `record-usage`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RecordUsageRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "service must be at most 100 characters"))]
    pub service: String,
    #[serde(default)]
    pub key_id: Option<Uuid>,
    #[serde(default)]
    #[validate(length(max = 255, message = "endpoint must be at most 255 characters"))]
    pub endpoint: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub input_tokens: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub output_tokens: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub cost_usd: Option<f64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl RecordUsageRequest {
    /// Broker-internal event for one of its own operations
    pub fn operation(service: &str, key_id: Option<Uuid>, endpoint: &str) -> Self {
        Self {
            service: service.to_string(),
            key_id,
            endpoint: Some(endpoint.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordUsageResponse {
    pub recorded: bool,
}
