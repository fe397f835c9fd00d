// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use datapress_publish::Publisher;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

mod config;
mod http;
mod telemetry;

pub const CRATE_NAME: &str = "datapress-server";

pub use config::{ServerConfig, CONFIG_SCHEMA_VERSION};
pub use http::{ApiError, ApiErrorCode};
pub use telemetry::init_tracing;

/// Per-process request counters and latency samples, scraped by `/metrics`.
#[derive(Default)]
pub(crate) struct RequestMetrics {
    counts: Mutex<HashMap<(String, u16), u64>>,
    latency_ns: Mutex<HashMap<String, Vec<u64>>>,
    attempts_started: AtomicU64,
    attempts_succeeded: AtomicU64,
    attempts_failed: AtomicU64,
    files_copied_total: AtomicU64,
}

impl RequestMetrics {
    pub(crate) async fn observe_request(&self, route: &str, status: StatusCode, latency: Duration) {
        let mut counts = self.counts.lock().await;
        *counts
            .entry((route.to_string(), status.as_u16()))
            .or_insert(0) += 1;
        drop(counts);
        let mut latency_map = self.latency_ns.lock().await;
        latency_map
            .entry(route.to_string())
            .or_insert_with(Vec::new)
            .push(latency.as_nanos() as u64);
    }

    pub(crate) fn attempt_started(&self) {
        self.attempts_started
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    pub(crate) fn attempt_finished(&self, succeeded: bool) {
        if succeeded {
            self.attempts_succeeded
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        } else {
            self.attempts_failed
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    pub(crate) fn add_files_copied(&self, count: u64) {
        self.files_copied_total
            .fetch_add(count, std::sync::atomic::Ordering::Relaxed);
    }
}

#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<Publisher>,
    pub ready: Arc<AtomicBool>,
    pub accepting_requests: Arc<AtomicBool>,
    pub(crate) metrics: Arc<RequestMetrics>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(publisher: Arc<Publisher>) -> Self {
        Self {
            publisher,
            ready: Arc::new(AtomicBool::new(true)),
            accepting_requests: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(RequestMetrics::default()),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(http::healthz_handler))
        .route("/readyz", get(http::readyz_handler))
        .route("/metrics", get(http::metrics_handler))
        .route("/v1/version", get(http::version_handler))
        .route(
            "/v1/datasets/:dataset_id/publish",
            post(http::publish_handler),
        )
        .route(
            "/v1/datasets/:dataset_id/publish/status",
            get(http::publish_status_handler),
        )
        .layer(DefaultBodyLimit::max(16 * 1024))
        .with_state(state)
}
