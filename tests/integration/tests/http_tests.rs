//! REST integration tests
//!
//! The transport runs against a local axum app that scripts rate limits,
//! server faults and error bodies.
//!
//! Run with: cargo test -p integration-tests --test http_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chord_common::{ClientError, ErrorKind};
use chord_core::AutocompleteResponse;
use chord_gateway::{Interaction, InteractionResponder};
use chord_http::{HttpResponse, HttpTransport, Route};
use integration_tests::{autocomplete_interaction, http_config, invalid_form_body, MockApi};
use serde_json::json;

type Hits = Arc<AtomicUsize>;

async fn start(app: Router<Hits>) -> (HttpTransport, Hits, MockApi) {
    let hits = Hits::default();
    let api = MockApi::start(app.with_state(hits.clone())).await.unwrap();
    let transport = HttpTransport::new("test-token", &http_config(api.base_url())).unwrap();
    (transport, hits, api)
}

fn create_message() -> Route {
    Route::post("/channels/{channel_id}/messages").param("channel_id", 10)
}

// ============================================================================
// Retries
// ============================================================================

async fn limited_once(State(hits): State<Hits>) -> Response {
    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
        let body = json!({ "message": "You are being rate limited.", "retry_after": 0.2, "global": false });
        return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    }
    Json(json!({ "id": "99", "content": "hi" })).into_response()
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let app = Router::new().route("/channels/:channel_id/messages", post(limited_once));
    let (transport, hits, _api) = start(app).await;

    let started = Instant::now();
    let response = transport
        .request(create_message(), Some(json!({ "content": "hi" })))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.value().unwrap()["id"], "99");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_millis(200));
}

async fn timed_request(transport: &HttpTransport) -> (chord_common::ClientResult<HttpResponse>, Duration) {
    let started = Instant::now();
    let response = transport.request(create_message(), None).await;
    (response, started.elapsed())
}

#[tokio::test]
async fn test_concurrent_callers_wait_out_a_429() {
    let app = Router::new().route("/channels/:channel_id/messages", post(limited_once));
    let (transport, hits, _api) = start(app).await;

    let ((first, first_wait), (second, second_wait)) =
        tokio::join!(timed_request(&transport), timed_request(&transport));

    assert_eq!(first.unwrap().status, 200);
    assert_eq!(second.unwrap().status, 200);
    assert!(first_wait >= Duration::from_millis(200));
    assert!(second_wait >= Duration::from_millis(200));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_429_on_last_attempt_still_blocks_the_bucket() {
    let app = Router::new().route("/channels/:channel_id/messages", post(limited_once));
    let hits = Hits::default();
    let api = MockApi::start(app.with_state(hits.clone())).await.unwrap();
    let mut config = http_config(api.base_url());
    config.max_attempts = 1;
    let transport = HttpTransport::new("test-token", &config).unwrap();

    let started = Instant::now();
    let error = transport.request(create_message(), None).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::RateLimitExceeded);

    let response = transport.request(create_message(), None).await.unwrap();
    assert_eq!(response.status, 200);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

async fn always_bad_gateway(State(hits): State<Hits>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response()
}

#[tokio::test]
async fn test_server_fault_after_retries() {
    let app = Router::new().route("/channels/:channel_id/messages", post(always_bad_gateway));
    let (transport, hits, _api) = start(app).await;

    let error = transport.request(create_message(), None).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ServerFault);
    assert!(matches!(error, ClientError::ServerFault { attempts: 3, .. }));
    assert_eq!(error.status(), Some(502));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

// ============================================================================
// Non-retryable errors
// ============================================================================

async fn invalid_body(State(hits): State<Hits>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::BAD_REQUEST, Json(invalid_form_body())).into_response()
}

#[tokio::test]
async fn test_client_error_carries_field_errors() {
    let app = Router::new().route("/channels/:channel_id/messages", post(invalid_body));
    let (transport, hits, _api) = start(app).await;

    let error = transport
        .request(create_message(), Some(json!({ "content": "x".repeat(2001) })))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ClientRequest);
    let api = error.api_error().expect("decoded error body");
    assert_eq!(api.code, 50035);
    assert_eq!(api.errors.len(), 1);
    assert_eq!(api.errors[0].path, "content");
    assert_eq!(api.errors[0].message, "Must be 2000 or fewer in length.");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

async fn unauthorized(State(hits): State<Hits>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    let body = json!({ "code": 0, "message": "401: Unauthorized" });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let app = Router::new().route("/channels/:channel_id/messages", post(unauthorized));
    let (transport, hits, _api) = start(app).await;

    let error = transport.request(create_message(), None).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Authentication);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Interaction responses
// ============================================================================

/// Interaction 1 succeeds, 2 was already acknowledged, 3 fails validation
async fn callback(State(hits): State<Hits>, Path((id, _token)): Path<(String, String)>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    match id.as_str() {
        "1" => StatusCode::NO_CONTENT.into_response(),
        "2" => {
            let body = json!({ "code": 40060, "message": "Interaction has already been acknowledged." });
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
        _ => (StatusCode::BAD_REQUEST, Json(invalid_form_body())).into_response(),
    }
}

fn interaction(id: u64) -> Interaction {
    serde_json::from_value(autocomplete_interaction(id, "ap")).unwrap()
}

#[tokio::test]
async fn test_responder_answers_once() {
    let app = Router::new().route("/interactions/:id/:token/callback", post(callback));
    let (transport, hits, _api) = start(app).await;
    let transport = Arc::new(transport);

    let responder = InteractionResponder::new(transport.clone(), &interaction(1));
    responder
        .autocomplete(AutocompleteResponse::new().with_choice("Apple", "Apple"))
        .await
        .unwrap();
    assert!(responder.is_done());

    let error = responder.send_message("again").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AlreadyResponded);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_responder_maps_already_acknowledged() {
    let app = Router::new().route("/interactions/:id/:token/callback", post(callback));
    let (transport, _hits, _api) = start(app).await;

    let responder = InteractionResponder::new(Arc::new(transport), &interaction(2));
    let error = responder
        .autocomplete(AutocompleteResponse::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AlreadyResponded);
    assert!(responder.is_done());
}

#[tokio::test]
async fn test_responder_releases_slot_after_failure() {
    let app = Router::new().route("/interactions/:id/:token/callback", post(callback));
    let (transport, hits, _api) = start(app).await;

    let responder = InteractionResponder::new(Arc::new(transport), &interaction(3));
    let error = responder
        .autocomplete(AutocompleteResponse::new().with_choice("Apple", "Apple"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ClientRequest);
    assert!(!responder.is_done());

    // Still allowed to try again
    let error = responder
        .autocomplete(AutocompleteResponse::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ClientRequest);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
