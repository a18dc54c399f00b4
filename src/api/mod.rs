// Northbound AF APIs, the SMF notification endpoint and health

mod error;
mod notification;
mod pfd;
mod traffic_influence;

pub use error::ApiError;
pub use notification::create_notification_router;
pub use pfd::create_pfd_router;
pub use traffic_influence::create_traffic_influence_router;

use crate::error::Resource;
use crate::notification::NotificationRouter;
use crate::registry::AfRegistry;
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state of every NEF handler
pub struct NefAppState {
    pub registry: Arc<AfRegistry>,
    pub notifications: Arc<NotificationRouter>,
}

/// Build the complete NEF router
pub fn create_router(state: NefAppState) -> Router {
    let state = Arc::new(state);
    Router::new()
        .merge(create_traffic_influence_router(state.clone()))
        .merge(create_pfd_router(state.clone()))
        .merge(create_notification_router(state.clone()))
        .merge(
            Router::new()
                .route("/health", get(health))
                .with_state(state),
        )
        .layer(TraceLayer::new_for_http())
}

/// GET /health - Liveness
async fn health(State(state): State<Arc<NefAppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "afs": state.registry.af_count(),
    }))
}

/// Parse a numeric path ID; anything else names no existing resource
fn parse_id(raw: &str, resource: Resource) -> Result<u64, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found(resource))
}
