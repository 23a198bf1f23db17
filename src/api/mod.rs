//! REST surface: message listing and triage, action-item CRUD, and the
//! manual poll trigger.

pub mod actions;
pub mod messages;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use tower_http::cors::CorsLayer;

use crate::error::DatabaseError;
use crate::ingest::MessageSource;
use crate::pipeline::Pipeline;
use crate::store::MessageStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn MessageStore>,
    pub pipeline: Arc<Pipeline>,
    pub source: Arc<dyn MessageSource>,
    /// Shared secret for the `x-api-key` header. `None` disables auth.
    pub api_key: Option<SecretString>,
}

/// Build the Axum router. `/health` stays outside the auth layer.
pub fn api_routes(state: ApiState) -> Router {
    let protected = Router::new()
        .merge(messages::routes())
        .merge(actions::routes())
        .layer(middleware::from_fn_with_state(state.clone(), require_key))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health))
        .with_state(state)
        .merge(protected)
        .layer(CorsLayer::permissive())
}

/// Unauthenticated liveness check; pings the store with a cheap query.
async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.pending_messages(1).await {
        Ok(_) => Json(serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"status": "degraded"})),
            )
                .into_response()
        }
    }
}

/// `x-api-key` header check. With no key configured every request
/// passes, matching a local single-user deployment.
async fn require_key(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let Some(expected) = &state.api_key else {
        return next.run(req).await;
    };
    let provided = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());
    if provided == Some(expected.expose_secret()) {
        next.run(req).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Invalid or missing API key"})),
        )
            .into_response()
    }
}

/// Map a store error to an HTTP response.
pub(crate) fn db_error(e: DatabaseError) -> Response {
    match e {
        DatabaseError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("{entity} not found: {id}")})),
        )
            .into_response(),
        other => {
            tracing::error!("Store error: {other}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Internal error"})),
            )
                .into_response()
        }
    }
}
