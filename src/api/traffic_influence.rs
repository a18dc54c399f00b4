use super::{parse_id, ApiError, NefAppState};
use crate::error::Resource;
use crate::model::{TrafficInfluSub, TrafficInfluSubPatch};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::info;

/// Create the 3GPP traffic influence router (TS 29.522)
pub fn create_traffic_influence_router(state: Arc<NefAppState>) -> Router {
    Router::new()
        .route(
            "/3gpp-traffic-influence/v1/:af_id/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route(
            "/3gpp-traffic-influence/v1/:af_id/subscriptions/:subscription_id",
            get(read_subscription)
                .put(update_subscription)
                .patch(patch_subscription)
                .delete(delete_subscription),
        )
        .with_state(state)
}

/// GET /3gpp-traffic-influence/v1/:af_id/subscriptions
async fn list_subscriptions(
    State(state): State<Arc<NefAppState>>,
    Path(af_id): Path<String>,
) -> Result<Json<Vec<TrafficInfluSub>>, ApiError> {
    Ok(Json(state.registry.list_subscriptions(&af_id).await?))
}

/// POST /3gpp-traffic-influence/v1/:af_id/subscriptions
async fn create_subscription(
    State(state): State<Arc<NefAppState>>,
    Path(af_id): Path<String>,
    Json(ti): Json<TrafficInfluSub>,
) -> Result<Response, ApiError> {
    info!(af_id = %af_id, af_trans_id = %ti.af_trans_id, "Creating traffic influence subscription");

    let (location, ti) = state.registry.add_subscription(&af_id, ti).await?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(ti),
    )
        .into_response())
}

/// GET /3gpp-traffic-influence/v1/:af_id/subscriptions/:subscription_id
async fn read_subscription(
    State(state): State<Arc<NefAppState>>,
    Path((af_id, subscription_id)): Path<(String, String)>,
) -> Result<Json<TrafficInfluSub>, ApiError> {
    let id = parse_id(&subscription_id, Resource::Subscription)?;
    Ok(Json(state.registry.get_subscription(&af_id, id).await?))
}

/// PUT /3gpp-traffic-influence/v1/:af_id/subscriptions/:subscription_id
async fn update_subscription(
    State(state): State<Arc<NefAppState>>,
    Path((af_id, subscription_id)): Path<(String, String)>,
    Json(ti): Json<TrafficInfluSub>,
) -> Result<Json<TrafficInfluSub>, ApiError> {
    let id = parse_id(&subscription_id, Resource::Subscription)?;
    Ok(Json(state.registry.update_subscription(&af_id, id, ti).await?))
}

/// PATCH /3gpp-traffic-influence/v1/:af_id/subscriptions/:subscription_id
async fn patch_subscription(
    State(state): State<Arc<NefAppState>>,
    Path((af_id, subscription_id)): Path<(String, String)>,
    Json(patch): Json<TrafficInfluSubPatch>,
) -> Result<Json<TrafficInfluSub>, ApiError> {
    let id = parse_id(&subscription_id, Resource::Subscription)?;
    Ok(Json(state.registry.patch_subscription(&af_id, id, patch).await?))
}

/// DELETE /3gpp-traffic-influence/v1/:af_id/subscriptions/:subscription_id
async fn delete_subscription(
    State(state): State<Arc<NefAppState>>,
    Path((af_id, subscription_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&subscription_id, Resource::Subscription)?;
    state.registry.delete_subscription(&af_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
