use crate::config::env_bool;
use crate::http::{make_request_id, with_request_id};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use opentelemetry::trace::TracerProvider as _;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const METRIC_SUBSYSTEM: &str = "datapress";
const METRIC_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Installs the global subscriber. JSON logs by default; an OTLP span
/// pipeline is added when `DATAPRESS_OTEL_ENABLED` is set.
pub fn init_tracing() -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_json = env_bool("DATAPRESS_LOG_JSON", true);
    if env_bool("DATAPRESS_OTEL_ENABLED", false) {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .build()
            .map_err(|err| format!("otlp exporter: {err}"))?;
        let tracer = opentelemetry_sdk::trace::TracerProvider::builder()
            .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
            .build()
            .tracer(crate::CRATE_NAME);
        if log_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .init();
        }
    } else if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    Ok(())
}

fn percentile_ns(values: &[u64], pct: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut v = values.to_vec();
    v.sort_unstable();
    let idx = ((v.len() as f64 - 1.0) * pct).round() as usize;
    v[idx]
}

pub(crate) async fn metrics_handler(State(state): State<AppState>) -> Response {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    let mut body = String::from(
        "datapress_publish_attempts_started{subsystem=\"%SUB%\",version=\"%VER%\"} %STARTED%\n\
datapress_publish_attempts_succeeded{subsystem=\"%SUB%\",version=\"%VER%\"} %OK%\n\
datapress_publish_attempts_failed{subsystem=\"%SUB%\",version=\"%VER%\"} %FAILED%\n\
datapress_publish_files_copied_total{subsystem=\"%SUB%\",version=\"%VER%\"} %COPIED%\n",
    )
    .replace("%SUB%", METRIC_SUBSYSTEM)
    .replace("%VER%", METRIC_VERSION)
    .replace(
        "%STARTED%",
        &state
            .metrics
            .attempts_started
            .load(Ordering::Relaxed)
            .to_string(),
    )
    .replace(
        "%OK%",
        &state
            .metrics
            .attempts_succeeded
            .load(Ordering::Relaxed)
            .to_string(),
    )
    .replace(
        "%FAILED%",
        &state
            .metrics
            .attempts_failed
            .load(Ordering::Relaxed)
            .to_string(),
    )
    .replace(
        "%COPIED%",
        &state
            .metrics
            .files_copied_total
            .load(Ordering::Relaxed)
            .to_string(),
    );

    let counts = state.metrics.counts.lock().await;
    let mut count_rows: Vec<(String, u16, u64)> = counts
        .iter()
        .map(|((route, status), count)| (route.clone(), *status, *count))
        .collect();
    drop(counts);
    count_rows.sort();
    for (route, status, count) in count_rows {
        body.push_str(&format!(
            "datapress_requests_total{{subsystem=\"{METRIC_SUBSYSTEM}\",version=\"{METRIC_VERSION}\",route=\"{route}\",status=\"{status}\"}} {count}\n"
        ));
    }

    let latency = state.metrics.latency_ns.lock().await;
    let mut latency_rows: Vec<(String, u64, u64)> = latency
        .iter()
        .map(|(route, samples)| {
            (
                route.clone(),
                percentile_ns(samples, 0.5),
                percentile_ns(samples, 0.95),
            )
        })
        .collect();
    drop(latency);
    latency_rows.sort();
    for (route, p50, p95) in latency_rows {
        body.push_str(&format!(
            "datapress_request_latency_p50_ms{{subsystem=\"{METRIC_SUBSYSTEM}\",version=\"{METRIC_VERSION}\",route=\"{route}\"}} {}\n",
            p50 / 1_000_000
        ));
        body.push_str(&format!(
            "datapress_request_latency_p95_ms{{subsystem=\"{METRIC_SUBSYSTEM}\",version=\"{METRIC_VERSION}\",route=\"{route}\"}} {}\n",
            p95 / 1_000_000
        ));
    }

    let resp = (StatusCode::OK, body).into_response();
    state
        .metrics
        .observe_request("/metrics", StatusCode::OK, started.elapsed())
        .await;
    with_request_id(resp, &request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_of_empty_is_zero() {
        assert_eq!(percentile_ns(&[], 0.95), 0);
    }

    #[test]
    fn percentile_picks_from_sorted_samples() {
        let samples = [50, 10, 40, 20, 30];
        assert_eq!(percentile_ns(&samples, 0.0), 10);
        assert_eq!(percentile_ns(&samples, 0.5), 30);
        assert_eq!(percentile_ns(&samples, 1.0), 50);
    }
}
