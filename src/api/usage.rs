//! Usage accounting endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use validator::Validate;

use crate::{
    models::{Caller, RecordUsageRequest, RecordUsageResponse},
    utils::{ApiResponse, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(record_usage))
}

async fn record_usage(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<RecordUsageRequest>, JsonRejection>,
) -> AppResult<ApiResponse<RecordUsageResponse>> {
    let Json(payload) = payload?;
    payload.validate()?;

    let response = state.broker.record_usage(&caller, payload).await?;
    Ok(ApiResponse::ok(response))
}
