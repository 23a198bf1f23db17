//! Action-item endpoints: cross-message listing plus manual CRUD.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiState, db_error};
use crate::pipeline::types::ImportanceTier;
use crate::store::{ActionItemFilter, ActionItemPatch};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/action-items", get(list_items).post(create_item))
        .route("/api/action-items/{id}", patch(patch_item).delete(delete_item))
}

#[derive(Deserialize)]
struct ListQuery {
    message_id: Option<String>,
    #[serde(default)]
    pending_only: bool,
    min_importance: Option<ImportanceTier>,
    limit: Option<u32>,
}

/// GET /api/action-items
async fn list_items(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let filter = ActionItemFilter {
        message_id: query.message_id,
        pending_only: query.pending_only,
        min_importance: query.min_importance,
        limit: query.limit.map(|l| l.min(500)),
    };
    match state.store.list_action_items(&filter).await {
        Ok(items) => Json(serde_json::json!({"action_items": items})).into_response(),
        Err(e) => db_error(e),
    }
}

#[derive(Deserialize)]
struct CreateItem {
    message_id: String,
    description: String,
    #[serde(default)]
    importance: ImportanceTier,
}

/// POST /api/action-items
async fn create_item(
    State(state): State<ApiState>,
    Json(body): Json<CreateItem>,
) -> impl IntoResponse {
    let description = body.description.trim();
    if description.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "description must not be empty"})),
        )
            .into_response();
    }
    match state
        .store
        .create_action_item(&body.message_id, description, body.importance)
        .await
    {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => db_error(e),
    }
}

#[derive(Deserialize)]
struct PatchItem {
    description: Option<String>,
    importance: Option<ImportanceTier>,
    is_done: Option<bool>,
}

/// PATCH /api/action-items/{id}
async fn patch_item(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(body): Json<PatchItem>,
) -> impl IntoResponse {
    if let Some(desc) = &body.description {
        if desc.trim().is_empty() {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"error": "description must not be empty"})),
            )
                .into_response();
        }
    }
    let patch = ActionItemPatch {
        description: body.description.map(|d| d.trim().to_string()),
        importance: body.importance,
        is_done: body.is_done,
    };
    match state.store.update_action_item(id, &patch).await {
        Ok(Some(item)) => Json(item).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("action item not found: {id}")})),
        )
            .into_response(),
        Err(e) => db_error(e),
    }
}

/// DELETE /api/action-items/{id}
async fn delete_item(State(state): State<ApiState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.store.delete_action_item(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("action item not found: {id}")})),
        )
            .into_response(),
        Err(e) => db_error(e),
    }
}
