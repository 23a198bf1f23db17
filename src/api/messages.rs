//! Message endpoints: listing with filters, triage patches, manual
//! poll, and re-processing.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use super::{ApiState, db_error};
use crate::pipeline::types::ImportanceTier;
use crate::store::{MessageFilter, MessageSort, SortOrder, StoredActionItem, StoredMessage};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/poll", post(poll))
        .route("/api/messages", get(list_messages))
        .route("/api/messages/{id}", get(get_message).patch(patch_message))
        .route("/api/messages/{id}/reprocess", post(reprocess_message))
        .route("/api/messages/{id}/read", patch(mark_read))
}

/// A stored message as the API presents it, with the effective tier
/// (override-aware) spelled out.
#[derive(Serialize)]
struct MessageView {
    #[serde(flatten)]
    message: StoredMessage,
    effective_importance: ImportanceTier,
}

impl From<StoredMessage> for MessageView {
    fn from(message: StoredMessage) -> Self {
        let effective_importance = message.effective_importance();
        Self {
            message,
            effective_importance,
        }
    }
}

#[derive(Serialize)]
struct MessageDetail {
    #[serde(flatten)]
    view: MessageView,
    action_items: Vec<StoredActionItem>,
}

/// POST /api/poll
///
/// Fetch the configured source and run the batch through the pipeline.
/// Re-polling unchanged messages is idempotent.
async fn poll(State(state): State<ApiState>) -> impl IntoResponse {
    match crate::ingest::poll_once(state.store.as_ref(), &state.pipeline, state.source.as_ref())
        .await
    {
        Ok((fetched, processed)) => {
            info!(fetched, processed, "Manual poll complete");
            Json(serde_json::json!({"fetched": fetched, "processed": processed})).into_response()
        }
        Err(crate::error::Error::Source(e)) => {
            tracing::error!("Source fetch failed: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": format!("Source fetch failed: {e}")})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Poll failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Internal error"})),
            )
                .into_response()
        }
    }
}

fn default_limit() -> u32 {
    50
}

#[derive(Deserialize)]
struct ListQuery {
    q: Option<String>,
    min_importance: Option<ImportanceTier>,
    #[serde(default)]
    unread_only: bool,
    newer_than: Option<DateTime<Utc>>,
    #[serde(default)]
    sort: MessageSort,
    #[serde(default)]
    order: SortOrder,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

/// GET /api/messages
async fn list_messages(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let filter = MessageFilter {
        q: query.q,
        min_importance: query.min_importance,
        unread_only: query.unread_only,
        newer_than: query.newer_than,
        sort: query.sort,
        order: query.order,
        limit: query.limit.min(500),
        offset: query.offset,
    };
    match state.store.list_messages(&filter).await {
        Ok((messages, total)) => {
            let views: Vec<MessageView> = messages.into_iter().map(MessageView::from).collect();
            Json(serde_json::json!({"messages": views, "total": total})).into_response()
        }
        Err(e) => db_error(e),
    }
}

/// GET /api/messages/{id}
async fn get_message(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_message(&id).await {
        Ok(Some(message)) => {
            let action_items = match state.store.actions_for_message(&id).await {
                Ok(items) => items,
                Err(e) => return db_error(e),
            };
            Json(MessageDetail {
                view: message.into(),
                action_items,
            })
            .into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("message not found: {id}")})),
        )
            .into_response(),
        Err(e) => db_error(e),
    }
}

/// Distinguishes an absent field from an explicit `null`: `null` clears
/// the override, absence leaves it alone.
fn double_option<'de, D>(de: D) -> Result<Option<Option<ImportanceTier>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<ImportanceTier>::deserialize(de).map(Some)
}

#[derive(Deserialize)]
struct MessagePatch {
    is_read: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    importance_override: Option<Option<ImportanceTier>>,
}

/// PATCH /api/messages/{id}
async fn patch_message(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(patch): Json<MessagePatch>,
) -> impl IntoResponse {
    if let Some(is_read) = patch.is_read {
        if let Err(e) = state.store.set_read(&id, is_read).await {
            return db_error(e);
        }
    }
    if let Some(override_tier) = patch.importance_override {
        if let Err(e) = state.store.set_importance_override(&id, override_tier).await {
            return db_error(e);
        }
    }
    match state.store.get_message(&id).await {
        Ok(Some(message)) => Json(MessageView::from(message)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("message not found: {id}")})),
        )
            .into_response(),
        Err(e) => db_error(e),
    }
}

/// PATCH /api/messages/{id}/read
async fn mark_read(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.set_read(&id, true).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => db_error(e),
    }
}

/// POST /api/messages/{id}/reprocess
///
/// Re-run the pipeline over the stored raw text. The derived state is
/// replaced wholesale; for unchanged text the outcome is identical.
async fn reprocess_message(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.pipeline.reprocess(state.store.as_ref(), &id).await {
        Ok(()) => match state.store.get_message(&id).await {
            Ok(Some(message)) => {
                let action_items = match state.store.actions_for_message(&id).await {
                    Ok(items) => items,
                    Err(e) => return db_error(e),
                };
                Json(MessageDetail {
                    view: message.into(),
                    action_items,
                })
                .into_response()
            }
            Ok(None) => StatusCode::NOT_FOUND.into_response(),
            Err(e) => db_error(e),
        },
        Err(crate::error::Error::Database(e)) => db_error(e),
        Err(e) => {
            tracing::error!("Reprocess failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Internal error"})),
            )
                .into_response()
        }
    }
}
