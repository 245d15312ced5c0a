//! Staff dashboard endpoints.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use mercado_common::AppResult;
use mercado_core::{
    AdminDisputeQuery, AssignModeratorInput, StateUpdateInput,
    dispute::{ActionOutcome, DisputePage, DisputeView},
};

use crate::{
    extractors::{AppJson, ClientMeta, StaffUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Search all disputes.
async fn list(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Query(query): Query<AdminDisputeQuery>,
) -> AppResult<ApiResponse<DisputePage>> {
    let page = state.dispute_service.admin_list(&user, query).await?;
    Ok(ApiResponse::ok(page))
}

/// Override a dispute's state.
async fn update_state(
    StaffUser(user): StaffUser,
    ClientMeta(meta): ClientMeta,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(input): AppJson<StateUpdateInput>,
) -> AppResult<ApiResponse<DisputeView>> {
    let dispute = state
        .dispute_service
        .admin_update_state(&user, &id, input, &meta)
        .await?;
    Ok(ApiResponse::ok(dispute))
}

/// Assign or clear the moderator of a dispute.
async fn assign_moderator(
    StaffUser(user): StaffUser,
    ClientMeta(meta): ClientMeta,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(input): AppJson<AssignModeratorInput>,
) -> AppResult<ApiResponse<ActionOutcome>> {
    let outcome = state
        .dispute_service
        .assign_moderator(&user, &id, input, &meta)
        .await?;
    Ok(ApiResponse::ok(outcome))
}

/// Create the staff dispute router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}/state", patch(update_state))
        .route("/{id}/moderator", patch(assign_moderator))
}
