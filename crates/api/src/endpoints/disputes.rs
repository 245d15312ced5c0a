//! Dispute endpoints for parties and moderators.

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mercado_common::{AppError, AppResult};
use mercado_core::{
    CreateDisputeInput, DecisionInput, MediationInput, MessageInput, PartyDisputeQuery,
    ProposalInput, RequestInfoInput,
    dispute::{ActionOutcome, DisputeDetail, DisputePage, DisputeView, MessagePosted, ReasonView},
};
use serde::Deserialize;

use crate::{
    extractors::{AppJson, AuthUser, ClientMeta, FormWithFiles},
    middleware::AppState,
    response::ApiResponse,
};

/// Upper bound for multipart bodies. Per-file limits are enforced by the service.
const MAX_UPLOAD_BODY: usize = 32 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct ReasonsQuery {
    pub categoria: Option<String>,
}

/// List reasons a dispute can be opened for.
async fn reasons(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ReasonsQuery>,
) -> AppResult<ApiResponse<Vec<ReasonView>>> {
    let reasons = state
        .dispute_service
        .reasons(query.categoria.as_deref())
        .await?;
    Ok(ApiResponse::ok(reasons))
}

/// Open a dispute. Answers 201 when created and 200 when one already existed.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    form: FormWithFiles<CreateDisputeInput>,
) -> AppResult<Response> {
    let outcome = state
        .dispute_service
        .create(&user, form.data, form.files)
        .await?;

    Ok(if outcome.created {
        ApiResponse::created(outcome).into_response()
    } else {
        ApiResponse::ok(outcome).into_response()
    })
}

/// The caller's own disputes.
async fn list_mine(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PartyDisputeQuery>,
) -> AppResult<ApiResponse<DisputePage>> {
    let page = state.dispute_service.list_mine(&user, query).await?;
    Ok(ApiResponse::ok(page))
}

/// A dispute with its thread.
async fn detail(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<DisputeDetail>> {
    let detail = state.dispute_service.get_detail(&user, &id).await?;
    Ok(ApiResponse::ok(detail))
}

/// Post a message, optionally with files.
async fn add_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: FormWithFiles<MessageInput>,
) -> AppResult<ApiResponse<MessagePosted>> {
    let posted = state
        .dispute_service
        .add_message(&user, &id, form.data, form.files)
        .await?;
    Ok(ApiResponse::ok(posted))
}

async fn request_info(
    AuthUser(user): AuthUser,
    ClientMeta(meta): ClientMeta,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(input): AppJson<RequestInfoInput>,
) -> AppResult<ApiResponse<DisputeView>> {
    let dispute = state
        .dispute_service
        .request_info(&user, &id, input, &meta)
        .await?;
    Ok(ApiResponse::ok(dispute))
}

async fn propose(
    AuthUser(user): AuthUser,
    ClientMeta(meta): ClientMeta,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(input): AppJson<ProposalInput>,
) -> AppResult<ApiResponse<DisputeView>> {
    let dispute = state
        .dispute_service
        .propose(&user, &id, input, &meta)
        .await?;
    Ok(ApiResponse::ok(dispute))
}

async fn decide(
    AuthUser(user): AuthUser,
    ClientMeta(meta): ClientMeta,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(input): AppJson<DecisionInput>,
) -> AppResult<ApiResponse<ActionOutcome>> {
    let outcome = state
        .dispute_service
        .decide(&user, &id, input, &meta)
        .await?;
    Ok(ApiResponse::ok(outcome))
}

/// Ask for a moderator. The body is optional.
async fn mediation(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<ApiResponse<DisputeView>> {
    let input: MediationInput = if body.iter().all(u8::is_ascii_whitespace) {
        MediationInput::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::Validation(e.to_string()))?
    };
    let dispute = state
        .dispute_service
        .request_mediation(&user, &id, input)
        .await?;
    Ok(ApiResponse::ok(dispute))
}

/// Create the disputes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_mine).post(create))
        .route("/reasons", get(reasons))
        .route("/{id}", get(detail))
        .route("/{id}/messages", post(add_message))
        .route("/{id}/request-info", post(request_info))
        .route("/{id}/proposal", post(propose))
        .route("/{id}/proposal/decision", post(decide))
        .route("/{id}/mediation", post(mediation))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY))
}
