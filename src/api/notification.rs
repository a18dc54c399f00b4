use super::{ApiError, NefAppState};
use crate::model::NsmfEventExposureNotification;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use std::sync::Arc;
use tracing::debug;

/// Create the router for SMF event exposure notifications
///
/// Mounted on the configured UPF notification path.
pub fn create_notification_router(state: Arc<NefAppState>) -> Router {
    let path = state.registry.config().upf_notification_path.clone();
    Router::new()
        .route(&path, post(smf_notification))
        .with_state(state)
}

/// POST {upf_notification_path} - UP path change from the SMF
async fn smf_notification(
    State(state): State<Arc<NefAppState>>,
    Json(notification): Json<NsmfEventExposureNotification>,
) -> Result<StatusCode, ApiError> {
    debug!(
        notif_id = %notification.notif_id,
        events = notification.event_notifs.len(),
        "SMF notification received"
    );

    // AF delivery runs detached; the SMF is acknowledged regardless
    state
        .notifications
        .route_smf_notification(&notification)
        .await?;
    Ok(StatusCode::OK)
}
