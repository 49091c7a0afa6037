//! oramond: HTTP surface of the oramon exporter.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `<metrics_path>` | Run one scrape cycle, Prometheus exposition |
//! | GET | `/` | Landing page linking to the metrics path |
//! | GET | `/healthz` | Liveness, always `ok` |

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use oramon_collector::Exporter;
use tracing::error;

/// Shared state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub exporter: Arc<Exporter>,
    pub metrics_path: String,
}

/// Build the router serving metrics from `exporter`.
pub fn build_router(exporter: Arc<Exporter>) -> Router {
    let metrics_path = exporter.config().metrics_path.clone();
    let state = AppState {
        exporter,
        metrics_path: metrics_path.clone(),
    };
    Router::new()
        .route(&metrics_path, get(metrics))
        .route("/", get(landing))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.exporter.collect().await {
        Ok(samples) => (
            StatusCode::OK,
            [(CONTENT_TYPE, oramon_metrics::CONTENT_TYPE)],
            oramon_metrics::render_prometheus(&samples),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "metrics collection failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn landing(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>Oracle DB Exporter</title></head>\n<body>\n\
         <h1>Oracle DB Exporter</h1>\n<p><a href=\"{path}\">Metrics</a></p>\n</body>\n</html>\n",
        path = state.metrics_path
    ))
}

async fn healthz() -> &'static str {
    "ok"
}
