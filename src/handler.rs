//! HTTP request handlers for the URL shortener API
//!
//! - `POST /shorten_url` creates (or returns the existing) mapping for a URL
//! - `GET /{short_key}` redirects to the target URL and counts a hit
//! - `GET /ping` reports liveness and version

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::middleware::RequestId;
use crate::model::{PingResponse, ResponseMeta, ShortenRequest, ShortenUrlResponse};
use crate::service::ShortenOutcome;
use crate::state::AppState;

/// Header selecting custom-key mode for `POST /shorten_url`.
pub const CUSTOM_SHORTEN_HEADER: &str = "x-custom-shorten";

/// Reads the `x-custom-shorten` flag; a missing header means `false`.
fn custom_shorten_flag(headers: &HeaderMap) -> Result<bool, String> {
    let Some(value) = headers.get(CUSTOM_SHORTEN_HEADER) else {
        return Ok(false);
    };
    let value = value
        .to_str()
        .map_err(|_| format!("{} must be a boolean", CUSTOM_SHORTEN_HEADER))?;

    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!(
            "{} must be a boolean, got `{}`",
            CUSTOM_SHORTEN_HEADER, other
        )),
    }
}

/// Creates a short key for a target URL
///
/// # Request
///
/// Header `x-custom-shorten: true` expects `custom_key` in the body;
/// otherwise `short_key_length` is expected and the key is generated.
///
/// ```json
/// {
///   "target_url": "https://example.com/very/long/url",
///   "tags": ["campaign"],
///   "short_key_length": 5
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - new mapping created
/// - **200 OK** - an active mapping for the target URL already existed
/// - **400 Bad Request** - custom key already in use
/// - **422 Unprocessable Entity** - malformed header or body
/// - **500 Internal Server Error** - generated key collided, or store failure
pub async fn shorten_url(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let custom = custom_shorten_flag(&headers)
        .map_err(|msg| AppError::validation(&request_id, json!({ "header": msg })))?;

    let request = ShortenRequest::parse(custom, &body)
        .map_err(|e| AppError::validation(&request_id, json!({ "body": e.to_string() })))?;
    request
        .validate(state.config.max_short_key_length)
        .map_err(|msg| AppError::validation(&request_id, json!({ "body": msg })))?;

    let outcome = state
        .service
        .shorten(&request)
        .await
        .map_err(|e| AppError::from_service(e, &request_id))?;

    let (status, message) = match &outcome {
        ShortenOutcome::Created(mapping) => (
            StatusCode::CREATED,
            format!(
                "a mapping between a {} and this {} created",
                mapping.short_key, mapping.target_url
            ),
        ),
        ShortenOutcome::Existing(_) => (
            StatusCode::OK,
            "a mapping between a key and this target_url already exists".to_string(),
        ),
    };

    info!(status = status.as_u16(), "create response");
    let response = ShortenUrlResponse {
        meta: ResponseMeta::new(true, &request_id, message),
        data: outcome.into_mapping().into(),
    };

    Ok((status, Json(response)).into_response())
}

/// Redirects a short key to its target URL
///
/// # Response
///
/// - **307 Temporary Redirect** - to the target URL; the hit counter is incremented
/// - **404 Not Found** - no active mapping for the key (`detail: "invalid short key"`)
///
/// A temporary redirect keeps browsers coming back, so every visit is counted.
pub async fn redirect_to_target(
    Path(short_key): Path<String>,
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Redirect, AppError> {
    let mapping = state
        .service
        .resolve(&short_key)
        .await
        .map_err(|e| AppError::from_service(e, &request_id))?;

    Ok(Redirect::temporary(&mapping.target_url))
}

pub async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    Json(PingResponse {
        success: true,
        version: state.config.app_version.clone(),
    })
}
