//! Backend client against a fake verification API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use chainverify_core::poller::{BackendError, PollStrategy, Poller, PollerConfig, VerificationBackend};
use chainverify_core::record::{StatusSource, VerificationRequest, VerificationStatus};
use chainverify_http::BackendClient;

const PROXY: &str = "0x1111111111111111111111111111111111111111";
const OFF: &str = "0x0000000000000000000000000000000000000410";

async fn trigger(Json(body): Json<Value>) -> impl IntoResponse {
    if body["proxyAddress"] == OFF {
        return (StatusCode::GONE, Json(json!({"status":"disabled","error":"verification disabled"})));
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"code":1,"status":"failed","explorer":null,"output":"Error: network timeout"})),
    )
}

async fn status(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    let address = q.get("proxyAddress").cloned().unwrap_or_default();
    if address.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error":"proxyAddress required"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "address": address,
            "status": "already_verified",
            "source": "api",
            "explorer": format!("https://bscscan.com/address/{address}#code"),
            "observedAt": "2026-01-01T00:00:00Z"
        })),
    )
}

async fn serve() -> String {
    let app = Router::new()
        .route("/api/verify-proxy", post(trigger))
        .route("/api/verify-proxy/status", get(status));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

fn request(proxy: &str) -> VerificationRequest {
    VerificationRequest {
        proxy_address: Some(proxy.into()),
        constructor_args: vec![json!("Example"), json!(18)],
        network: Some("bscTestnet".into()),
    }
}

#[tokio::test]
async fn failed_trigger_still_decodes_outcome() {
    let client = BackendClient::new(serve().await, Duration::from_secs(5)).unwrap();
    assert!(!client.base_url().ends_with('/'));

    let outcome = client.trigger(&request(PROXY)).await.unwrap();
    assert_eq!(outcome.status, VerificationStatus::Failed);
    assert_eq!(outcome.code, Some(1));
    assert!(outcome.output.contains("network timeout"));
}

#[tokio::test]
async fn gone_maps_to_disabled() {
    let client = BackendClient::new(serve().await, Duration::from_secs(5)).unwrap();
    assert!(matches!(client.trigger(&request(OFF)).await, Err(BackendError::Disabled)));
}

#[tokio::test]
async fn status_decodes_record_and_rejects_errors() {
    let client = BackendClient::new(serve().await, Duration::from_secs(5)).unwrap();
    let rec = client.status(PROXY).await.unwrap();
    assert_eq!(rec.status, VerificationStatus::AlreadyVerified);
    assert_eq!(rec.source, StatusSource::Api);

    match client.status("").await {
        Err(BackendError::Http { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("proxyAddress required"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn poller_recovers_from_failed_trigger() {
    let client = Arc::new(BackendClient::new(serve().await, Duration::from_secs(5)).unwrap());
    let poller = Poller::new(
        client,
        PollerConfig {
            interval: Duration::from_millis(10),
            max_duration: Duration::from_secs(2),
        },
    );
    let out = poller.run(PollStrategy::Verify, &request(PROXY)).await;
    assert_eq!(out.label(), "verified");
}
