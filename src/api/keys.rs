//! Provider key endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{
        Caller, ChangeScopeRequest, ChangeScopeResponse, DeleteKeyResponse, KeyListing,
        KeySummary, ResolveKeyRequest, ResolvedKey, SaveKeyRequest,
    },
    utils::{ApiResponse, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_keys).post(save_key))
        .route("/resolve", post(resolve_key))
        .route("/{id}", axum::routing::delete(delete_key))
        .route("/{id}/scope", patch(change_scope))
}

#[derive(Debug, Deserialize, Default)]
struct KeyListQuery {
    service: Option<String>,
}

async fn resolve_key(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<ResolveKeyRequest>, JsonRejection>,
) -> AppResult<ApiResponse<ResolvedKey>> {
    let Json(payload) = payload?;
    payload.validate()?;

    let resolved = state
        .broker
        .resolve(&caller, &payload.service, payload.preference)
        .await?;

    Ok(ApiResponse::ok(resolved))
}

async fn save_key(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<SaveKeyRequest>, JsonRejection>,
) -> AppResult<ApiResponse<KeySummary>> {
    let Json(payload) = payload?;
    payload.validate()?;

    let summary = state.broker.save(&caller, payload).await?;
    Ok(ApiResponse::created(summary))
}

async fn change_scope(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ChangeScopeRequest>, JsonRejection>,
) -> AppResult<ApiResponse<ChangeScopeResponse>> {
    let Path(id) = id?;
    let Json(payload) = payload?;

    let response = state.broker.change_scope(&caller, id, payload.scope).await?;
    Ok(ApiResponse::ok(response))
}

async fn list_keys(
    State(state): State<AppState>,
    caller: Caller,
    query: Result<Query<KeyListQuery>, QueryRejection>,
) -> AppResult<ApiResponse<KeyListing>> {
    let Query(query) = query?;

    let listing = state.broker.list(&caller, query.service.as_deref()).await?;
    Ok(ApiResponse::ok(listing))
}

async fn delete_key(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<ApiResponse<DeleteKeyResponse>> {
    let Path(id) = id?;

    let response = state.broker.delete(&caller, id).await?;
    Ok(ApiResponse::ok(response))
}
