//! API integration tests.
//!
//! These tests drive the router with a mock database behind it.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    middleware::{from_fn, from_fn_with_state},
};
use mercado_api::{
    StreamingState,
    middleware::{AppState, auth_middleware, metrics_middleware},
    router as api_router,
};
use mercado_common::{DisputeConfig, IdGenerator, get_metrics};
use mercado_core::{
    AttachmentService, DisputeService, NoOpStorage, NotificationService, UserService,
};
use mercado_db::{
    entities::{dispute_reason, user},
    repositories::{DisputeRepository, NotificationRepository, SubjectRepository, UserRepository},
    test_utils::fixtures,
};
use sea_orm::{DatabaseBackend, MockDatabase};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

/// Create test app state over `db`.
fn create_test_state(db: MockDatabase) -> AppState {
    let db = Arc::new(db.into_connection());
    let config = DisputeConfig::default();

    let user_repo = UserRepository::new(Arc::clone(&db));
    let streaming = StreamingState::new();

    let mut notification_service =
        NotificationService::new(NotificationRepository::new(Arc::clone(&db)));
    notification_service.set_event_publisher(Arc::new(streaming.clone()));

    let mut dispute_service = DisputeService::new(
        DisputeRepository::new(Arc::clone(&db)),
        user_repo.clone(),
        SubjectRepository::new(Arc::clone(&db)),
        notification_service,
        AttachmentService::new(
            Arc::new(NoOpStorage::new("https://files.test".to_string())),
            &config,
        ),
        config,
    );
    dispute_service.set_event_publisher(Arc::new(streaming.clone()));

    AppState {
        user_service: UserService::new(user_repo),
        dispute_service,
        streaming,
    }
}

/// Create the test router with authentication, as the server mounts it.
fn create_test_router(db: MockDatabase) -> Router {
    let state = create_test_state(db);
    api_router()
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// A mock database that answers the token lookup with `user`.
fn authenticated_as(user: &user::Model) -> MockDatabase {
    MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user.clone()]])
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).method("GET");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, token: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_disputes_require_token() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app.oneshot(get("/disputes", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<user::Model>::new()]);
    let app = create_test_router(db);

    let response = app
        .oneshot(get("/disputes/reasons", Some("nope")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reasons_fall_back_to_builtin_list() {
    let buyer = fixtures::user("buyer", "buyer");
    let db = authenticated_as(&buyer).append_query_results([Vec::<dispute_reason::Model>::new()]);
    let app = create_test_router(db);

    let response = app
        .oneshot(get("/disputes/reasons?categoria=order", Some("token-buyer")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let reasons = body["data"].as_array().unwrap();
    assert!(!reasons.is_empty());
    assert!(reasons.iter().all(|r| r["categoria"] == "order"));
}

#[tokio::test]
async fn test_malformed_dispute_id_is_bad_request() {
    let buyer = fixtures::user("buyer", "buyer");
    let app = create_test_router(authenticated_as(&buyer));

    let response = app
        .oneshot(get("/disputes/not-an-id", Some("token-buyer")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_outsider_cannot_read_dispute() {
    let outsider = fixtures::user("outsider", "outsider");
    let dispute = fixtures::dispute(&IdGenerator::new().generate(), "buyer", "seller");
    let db = authenticated_as(&outsider).append_query_results([[dispute.clone()]]);
    let app = create_test_router(db);

    let response = app
        .oneshot(get(&format!("/disputes/{}", dispute.id), Some("token-outsider")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_list_requires_staff() {
    let buyer = fixtures::user("buyer", "buyer");
    let app = create_test_router(authenticated_as(&buyer));

    let response = app
        .oneshot(get("/disputes/admin", Some("token-buyer")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_create_returns_existing_dispute_with_ok() {
    let buyer = fixtures::user("buyer", "buyer");
    let existing = fixtures::dispute(&IdGenerator::new().generate(), "buyer", "seller");
    let db = authenticated_as(&buyer)
        .append_query_results([[fixtures::order("order-1", "buyer", "seller")]])
        .append_query_results([Vec::<dispute_reason::Model>::new()])
        .append_query_results([[existing.clone()]]);
    let app = create_test_router(db);

    let payload = json!({
        "context": "order",
        "orderId": "order-1",
        "motivoClave": "no_recibido",
        "descripcionInicial": "Never arrived",
    });
    let response = app
        .oneshot(
            Request::builder()
                .uri("/disputes")
                .method("POST")
                .header(header::AUTHORIZATION, "Bearer token-buyer")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["created"], false);
    assert_eq!(body["data"]["id"], existing.id.as_str());
}

#[tokio::test]
async fn test_create_with_unknown_reason_is_rejected() {
    let buyer = fixtures::user("buyer", "buyer");
    let db = authenticated_as(&buyer)
        .append_query_results([[fixtures::order("order-1", "buyer", "seller")]])
        .append_query_results([Vec::<dispute_reason::Model>::new()]);
    let app = create_test_router(db);

    let payload = json!({
        "context": "order",
        "orderId": "order-1",
        "motivoClave": "changed_my_mind",
        "descripcionInicial": "Not needed anymore",
    });
    let response = app
        .oneshot(
            Request::builder()
                .uri("/disputes")
                .method("POST")
                .header(header::AUTHORIZATION, "Bearer token-buyer")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_decision_is_validation_error() {
    let buyer = fixtures::user("buyer", "buyer");
    let app = create_test_router(authenticated_as(&buyer));
    let uri = format!("/disputes/{}/proposal/decision", IdGenerator::new().generate());

    let response = app
        .oneshot(send_json("POST", &uri, "token-buyer", &json!({"decision": "maybe"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_state_override_without_estado_is_validation_error() {
    let mut admin = fixtures::user("root", "root");
    admin.is_admin = true;
    let app = create_test_router(authenticated_as(&admin));
    let uri = format!("/disputes/admin/{}/state", IdGenerator::new().generate());

    let response = app
        .oneshot(send_json("PATCH", &uri, "token-root", &json!({"nota": "closing"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app.oneshot(get("/metrics/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_prometheus_metrics_are_text() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(get("/metrics/prometheus", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(get("/nonexistent/endpoint", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_middleware_counts_requests() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres))
        .layer(from_fn(metrics_middleware));
    let before = get_metrics().snapshot();

    let response = app.oneshot(get("/disputes", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let after = get_metrics().snapshot();
    assert!(after.http_requests_total > before.http_requests_total);
    assert!(after.http_requests_4xx > before.http_requests_4xx);
}
