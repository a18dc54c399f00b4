use super::{parse_id, ApiError, NefAppState};
use crate::error::Resource;
use crate::model::{PfdData, PfdManagement};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Create the 3GPP PFD management router (TS 29.122)
pub fn create_pfd_router(state: Arc<NefAppState>) -> Router {
    Router::new()
        .route(
            "/3gpp-pfd-management/v1/:scs_as_id/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/3gpp-pfd-management/v1/:scs_as_id/transactions/:transaction_id",
            get(read_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        .route(
            "/3gpp-pfd-management/v1/:scs_as_id/transactions/:transaction_id/applications/:app_id",
            get(read_application)
                .put(update_application)
                .patch(patch_application)
                .delete(delete_application),
        )
        .with_state(state)
}

/// GET /3gpp-pfd-management/v1/:scs_as_id/transactions
async fn list_transactions(
    State(state): State<Arc<NefAppState>>,
    Path(scs_as_id): Path<String>,
) -> Result<Json<Vec<PfdManagement>>, ApiError> {
    Ok(Json(state.registry.list_transactions(&scs_as_id).await?))
}

/// POST /3gpp-pfd-management/v1/:scs_as_id/transactions
async fn create_transaction(
    State(state): State<Arc<NefAppState>>,
    Path(scs_as_id): Path<String>,
    Json(payload): Json<PfdManagement>,
) -> Result<Response, ApiError> {
    info!(
        scs_as_id = %scs_as_id,
        apps = payload.pfd_datas.len(),
        "Creating PFD transaction"
    );

    let outcome = state.registry.add_transaction(&scs_as_id, payload).await?;
    if !outcome.reports.is_empty() {
        warn!(
            scs_as_id = %scs_as_id,
            failed = outcome.reports.failed_count(),
            "PFD transaction created with failed applications"
        );
    }

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, outcome.location)],
        Json(outcome.transaction),
    )
        .into_response())
}

/// GET /3gpp-pfd-management/v1/:scs_as_id/transactions/:transaction_id
async fn read_transaction(
    State(state): State<Arc<NefAppState>>,
    Path((scs_as_id, transaction_id)): Path<(String, String)>,
) -> Result<Json<PfdManagement>, ApiError> {
    let id = parse_id(&transaction_id, Resource::Transaction)?;
    Ok(Json(state.registry.get_transaction(&scs_as_id, id).await?))
}

/// PUT /3gpp-pfd-management/v1/:scs_as_id/transactions/:transaction_id
async fn update_transaction(
    State(state): State<Arc<NefAppState>>,
    Path((scs_as_id, transaction_id)): Path<(String, String)>,
    Json(payload): Json<PfdManagement>,
) -> Result<Json<PfdManagement>, ApiError> {
    let id = parse_id(&transaction_id, Resource::Transaction)?;
    let outcome = state
        .registry
        .update_transaction(&scs_as_id, id, payload)
        .await?;
    Ok(Json(outcome.transaction))
}

/// DELETE /3gpp-pfd-management/v1/:scs_as_id/transactions/:transaction_id
async fn delete_transaction(
    State(state): State<Arc<NefAppState>>,
    Path((scs_as_id, transaction_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&transaction_id, Resource::Transaction)?;
    state.registry.delete_transaction(&scs_as_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET .../transactions/:transaction_id/applications/:app_id
async fn read_application(
    State(state): State<Arc<NefAppState>>,
    Path((scs_as_id, transaction_id, app_id)): Path<(String, String, String)>,
) -> Result<Json<PfdData>, ApiError> {
    let id = parse_id(&transaction_id, Resource::Transaction)?;
    let app = state
        .registry
        .get_application(&scs_as_id, id, &app_id)
        .await
        .map_err(ApiError::single_app)?;
    Ok(Json(app))
}

/// PUT .../transactions/:transaction_id/applications/:app_id
async fn update_application(
    State(state): State<Arc<NefAppState>>,
    Path((scs_as_id, transaction_id, app_id)): Path<(String, String, String)>,
    Json(app): Json<PfdData>,
) -> Result<Json<PfdData>, ApiError> {
    let id = parse_id(&transaction_id, Resource::Transaction)?;
    let app = state
        .registry
        .update_application(&scs_as_id, id, &app_id, app)
        .await
        .map_err(ApiError::single_app)?;
    Ok(Json(app))
}

/// PATCH .../transactions/:transaction_id/applications/:app_id
async fn patch_application(
    State(state): State<Arc<NefAppState>>,
    Path((scs_as_id, transaction_id, app_id)): Path<(String, String, String)>,
    Json(patch): Json<PfdData>,
) -> Result<Json<PfdData>, ApiError> {
    let id = parse_id(&transaction_id, Resource::Transaction)?;
    let app = state
        .registry
        .patch_application(&scs_as_id, id, &app_id, patch)
        .await
        .map_err(ApiError::single_app)?;
    Ok(Json(app))
}

/// DELETE .../transactions/:transaction_id/applications/:app_id
async fn delete_application(
    State(state): State<Arc<NefAppState>>,
    Path((scs_as_id, transaction_id, app_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&transaction_id, Resource::Transaction)?;
    state
        .registry
        .delete_application(&scs_as_id, id, &app_id)
        .await
        .map_err(ApiError::single_app)?;
    Ok(StatusCode::NO_CONTENT)
}
