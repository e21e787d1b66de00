//! HTTP routes.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use chainverify_core::error::VerifyError;
use chainverify_core::record::{VerificationRequest, VerificationStatus};
use chainverify_core::token_config::{validate_token_config, TokenConfigError};

use crate::artifacts::{load_artifact, read_json_file, ArtifactError};
use crate::service::VerificationService;

pub const SERVICE_NAME: &str = "chainverify";
pub const BANNER: &str = "chainverify backend running";

const DISABLED_MESSAGE: &str = "proxy verification is disabled; set VERIFY_PROXY_ENABLED=true to enable it";
const INTERACT_MESSAGE: &str = "Server-side interactions disabled. Sign transactions with a wallet in the browser.";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<VerificationService>,
    pub verify_enabled: bool,
    pub deployed_addresses_path: PathBuf,
    pub artifacts_dir: PathBuf,
    /// Decides whether a token launch needs an explicit router.
    pub rpc_url: Option<String>,
}

/// Errors rendered as `{ "error": ... }` with a matching status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{}", DISABLED_MESSAGE)]
    Disabled,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, body) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Self::Disabled => (
                StatusCode::GONE,
                json!({ "status": "disabled", "error": DISABLED_MESSAGE }),
            ),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
        };
        (code, Json(body)).into_response()
    }
}

impl From<VerifyError> for ApiError {
    fn from(e: VerifyError) -> Self {
        if e.is_bad_request() {
            Self::BadRequest(e.to_string())
        } else {
            Self::Internal(e.to_string())
        }
    }
}

/// File errors keep server paths out of the response body.
fn file_error(e: ArtifactError, not_found: &str, unreadable: &str) -> ApiError {
    match e {
        ArtifactError::NotFound(what) => {
            tracing::debug!(file = %what, "static file not found");
            ApiError::NotFound(not_found.to_string())
        }
        other => {
            tracing::error!(error = %other, "static file unreadable");
            ApiError::Internal(unreadable.to_string())
        }
    }
}

impl From<TokenConfigError> for ApiError {
    fn from(e: TokenConfigError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { BANNER }))
        .route("/health", get(health))
        .route("/deployed_addresses.json", get(deployed_addresses))
        .route("/artifacts/:file", get(artifact))
        .route("/api/verify-proxy", post(verify_proxy))
        .route("/api/verify-proxy/status", get(verify_status))
        .route("/api/token-config/validate", post(validate_token))
        .route("/interact", post(interact))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let cache = state.service.cache();
    Json(json!({
        "ok": true,
        "service": SERVICE_NAME,
        "verifyEnabled": state.verify_enabled,
        "cachedRecords": cache.len(),
        "cacheTtlSecs": cache.ttl().as_secs(),
        "verificationsInFlight": state.service.verifications_in_flight(),
    }))
}

async fn deployed_addresses(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    read_json_file(&state.deployed_addresses_path)
        .await
        .map(Json)
        .map_err(|e| file_error(e, "Not found", "Failed to read deployed addresses"))
}

async fn artifact(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Json<Value>, ApiError> {
    load_artifact(&state.artifacts_dir, &file)
        .await
        .map(Json)
        .map_err(|e| file_error(e, "Artifact not found", "Failed to read artifact"))
}

fn required_proxy(value: Option<String>) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest("proxyAddress required".into()))
}

async fn verify_proxy(
    State(state): State<AppState>,
    body: Result<Json<VerificationRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    if !state.verify_enabled {
        return Err(ApiError::Disabled);
    }
    // No body at all reads as an empty request.
    let req = match body {
        Ok(Json(req)) => req,
        Err(JsonRejection::MissingJsonContentType(_)) => VerificationRequest::default(),
        Err(e) => return Err(e.into()),
    };
    let proxy = required_proxy(req.proxy_address)?;

    let outcome = state
        .service
        .verify(&proxy, &req.constructor_args, req.network.as_deref())
        .await?;
    let code = if outcome.status.is_verified() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((code, Json(outcome)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusQuery {
    proxy_address: Option<String>,
}

async fn verify_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, ApiError> {
    if !state.verify_enabled {
        return Err(ApiError::Disabled);
    }
    let proxy = required_proxy(query.proxy_address)?;

    let record = state.service.status(&proxy).await?;
    let code = if record.status == VerificationStatus::Failed {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    Ok((code, Json(record)).into_response())
}

async fn validate_token(
    State(state): State<AppState>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(config) = body?;
    let validated = validate_token_config(&config, state.rpc_url.as_deref())?;
    Ok(Json(validated).into_response())
}

async fn interact() -> ApiError {
    ApiError::Forbidden(INTERACT_MESSAGE)
}
