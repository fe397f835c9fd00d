// SPDX-License-Identifier: Apache-2.0

use crate::{AppState, CONFIG_SCHEMA_VERSION, CRATE_NAME};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use datapress_model::{DatasetId, UserId};
use datapress_publish::{
    PublishError, PublishErrorCode, DEFAULT_IDENTIFIER_PREFIX, SQLITE_SCHEMA_VERSION,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::info;

const PUBLISH_ROUTE: &str = "/v1/datasets/{dataset_id}/publish";
const STATUS_ROUTE: &str = "/v1/datasets/{dataset_id}/publish/status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    InvalidRequest,
    NotFound,
    ValidationFailed,
    AttemptInProgress,
    InvalidState,
    StorageUnreachable,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
}

impl ApiError {
    #[must_use]
    pub fn invalid_request(message: impl Into<String>, details: Value) -> Self {
        Self {
            code: ApiErrorCode::InvalidRequest,
            message: message.into(),
            details,
        }
    }
}

/// Maps a pipeline error onto the wire: status code, stable error code,
/// and the validator's field errors passed through untouched.
fn publish_error(err: &PublishError) -> (StatusCode, ApiError) {
    let (status, code) = match err.code {
        PublishErrorCode::NotFound => (StatusCode::NOT_FOUND, ApiErrorCode::NotFound),
        PublishErrorCode::ValidationFailed => {
            (StatusCode::BAD_REQUEST, ApiErrorCode::ValidationFailed)
        }
        PublishErrorCode::AttemptInProgress => {
            (StatusCode::CONFLICT, ApiErrorCode::AttemptInProgress)
        }
        PublishErrorCode::InvalidState => {
            (StatusCode::UNPROCESSABLE_ENTITY, ApiErrorCode::InvalidState)
        }
        PublishErrorCode::StorageUnreachable => {
            (StatusCode::SERVICE_UNAVAILABLE, ApiErrorCode::StorageUnreachable)
        }
        PublishErrorCode::PersistenceFailure => {
            (StatusCode::INTERNAL_SERVER_ERROR, ApiErrorCode::Internal)
        }
    };
    let mut details = json!({});
    if let Some(stage) = err.stage {
        details["stage"] = json!(stage.as_str());
    }
    if !err.field_errors.is_empty() {
        details["field_errors"] = json!(err.field_errors);
    }
    (
        status,
        ApiError {
            code,
            message: err.message.clone(),
            details,
        },
    )
}

pub(crate) fn api_error_response(status: StatusCode, err: ApiError) -> Response {
    (status, Json(json!({"error": err}))).into_response()
}

pub(crate) fn make_request_id(state: &AppState) -> String {
    let id = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
    format!("req-{id:016x}")
}

pub(crate) fn propagated_request_id(headers: &HeaderMap, state: &AppState) -> String {
    if let Some(raw) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    make_request_id(state)
}

pub(crate) fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(v) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", v);
    }
    response
}

fn wants_background(params: &HashMap<String, String>) -> bool {
    params
        .get("background")
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn user_from_headers(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ApiError::invalid_request("missing x-user-id header", json!({"header": "x-user-id"}))
        })?;
    UserId::parse(raw).map_err(|err| {
        ApiError::invalid_request(
            format!("invalid x-user-id header: {err}"),
            json!({"header": "x-user-id"}),
        )
    })
}

pub(crate) async fn healthz_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    let resp = (StatusCode::OK, "ok").into_response();
    state
        .metrics
        .observe_request("/healthz", StatusCode::OK, started.elapsed())
        .await;
    with_request_id(resp, &request_id)
}

pub(crate) async fn readyz_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    if state.ready.load(Ordering::Relaxed) {
        let resp = (StatusCode::OK, "ready").into_response();
        state
            .metrics
            .observe_request("/readyz", StatusCode::OK, started.elapsed())
            .await;
        with_request_id(resp, &request_id)
    } else {
        let resp = (StatusCode::SERVICE_UNAVAILABLE, "not-ready").into_response();
        state
            .metrics
            .observe_request("/readyz", StatusCode::SERVICE_UNAVAILABLE, started.elapsed())
            .await;
        with_request_id(resp, &request_id)
    }
}

pub(crate) async fn version_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    let payload = json!({
        "server": {
            "crate": CRATE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "config_schema_version": CONFIG_SCHEMA_VERSION,
        },
        "registry": {
            "schema_version": SQLITE_SCHEMA_VERSION,
        },
        "identifier": {
            "default_prefix": DEFAULT_IDENTIFIER_PREFIX,
        }
    });
    let mut response = Json(payload).into_response();
    if let Ok(value) = HeaderValue::from_str("public, max-age=30") {
        response.headers_mut().insert("cache-control", value);
    }
    state
        .metrics
        .observe_request("/v1/version", StatusCode::OK, started.elapsed())
        .await;
    with_request_id(response, &request_id)
}

pub(crate) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    crate::telemetry::metrics_handler(State(state)).await
}

pub(crate) async fn publish_handler(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();

    let dataset = match DatasetId::parse(&dataset_id) {
        Ok(dataset) => dataset,
        Err(err) => {
            let api_err = ApiError::invalid_request(
                format!("invalid dataset id: {err}"),
                json!({"dataset_id": dataset_id}),
            );
            let resp = api_error_response(StatusCode::BAD_REQUEST, api_err);
            state
                .metrics
                .observe_request(PUBLISH_ROUTE, StatusCode::BAD_REQUEST, started.elapsed())
                .await;
            return with_request_id(resp, &request_id);
        }
    };
    let user = match user_from_headers(&headers) {
        Ok(user) => user,
        Err(api_err) => {
            let resp = api_error_response(StatusCode::BAD_REQUEST, api_err);
            state
                .metrics
                .observe_request(PUBLISH_ROUTE, StatusCode::BAD_REQUEST, started.elapsed())
                .await;
            return with_request_id(resp, &request_id);
        }
    };

    if wants_background(&params) {
        info!(dataset = %dataset, request_id = %request_id, "background publish accepted");
        state.metrics.attempt_started();
        let publisher = state.publisher.clone();
        let metrics = state.metrics.clone();
        let task_dataset = dataset.clone();
        tokio::spawn(async move {
            match publisher.start_publish(&task_dataset, &user).await {
                Ok(receipt) => {
                    metrics.attempt_finished(true);
                    metrics.add_files_copied(receipt.files_copied);
                }
                Err(_) => metrics.attempt_finished(false),
            }
        });
        let resp = (
            StatusCode::ACCEPTED,
            Json(json!({
                "dataset_id": dataset,
                "status_url": format!("/v1/datasets/{dataset}/publish/status"),
            })),
        )
            .into_response();
        state
            .metrics
            .observe_request(PUBLISH_ROUTE, StatusCode::ACCEPTED, started.elapsed())
            .await;
        return with_request_id(resp, &request_id);
    }

    state.metrics.attempt_started();
    match state.publisher.start_publish(&dataset, &user).await {
        Ok(receipt) => {
            state.metrics.attempt_finished(true);
            state.metrics.add_files_copied(receipt.files_copied);
            let resp = (StatusCode::OK, Json(receipt)).into_response();
            state
                .metrics
                .observe_request(PUBLISH_ROUTE, StatusCode::OK, started.elapsed())
                .await;
            with_request_id(resp, &request_id)
        }
        Err(err) => {
            state.metrics.attempt_finished(false);
            let (status, api_err) = publish_error(&err);
            let resp = api_error_response(status, api_err);
            state
                .metrics
                .observe_request(PUBLISH_ROUTE, status, started.elapsed())
                .await;
            with_request_id(resp, &request_id)
        }
    }
}

pub(crate) async fn publish_status_handler(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();

    let dataset = match DatasetId::parse(&dataset_id) {
        Ok(dataset) => dataset,
        Err(err) => {
            let api_err = ApiError::invalid_request(
                format!("invalid dataset id: {err}"),
                json!({"dataset_id": dataset_id}),
            );
            let resp = api_error_response(StatusCode::BAD_REQUEST, api_err);
            state
                .metrics
                .observe_request(STATUS_ROUTE, StatusCode::BAD_REQUEST, started.elapsed())
                .await;
            return with_request_id(resp, &request_id);
        }
    };

    match state.publisher.status_of(&dataset).await {
        Ok(Some(status)) => {
            let resp = (StatusCode::OK, Json(status)).into_response();
            state
                .metrics
                .observe_request(STATUS_ROUTE, StatusCode::OK, started.elapsed())
                .await;
            with_request_id(resp, &request_id)
        }
        Ok(None) => {
            let api_err = ApiError {
                code: ApiErrorCode::NotFound,
                message: format!("no publishing status recorded for `{dataset}`"),
                details: json!({"dataset_id": dataset}),
            };
            let resp = api_error_response(StatusCode::NOT_FOUND, api_err);
            state
                .metrics
                .observe_request(STATUS_ROUTE, StatusCode::NOT_FOUND, started.elapsed())
                .await;
            with_request_id(resp, &request_id)
        }
        Err(err) => {
            let (status, api_err) = publish_error(&err);
            let resp = api_error_response(status, api_err);
            state
                .metrics
                .observe_request(STATUS_ROUTE, status, started.elapsed())
                .await;
            with_request_id(resp, &request_id)
        }
    }
}
