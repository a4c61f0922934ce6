// Web server — liveness check and the externally-triggered reconciliation.
//
// Hosting platforms ping `/` to keep the process alive; a scheduler hits
// `/<BOT_ENDPOINT>` to run a reconciliation pass. The endpoint name doubles
// as a shared secret, so it is only mounted when configured.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::mastodon::api::MastodonApi;
use crate::pipeline::reconcile;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn MastodonApi>,
    pub concurrency: usize,
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(state: AppState, bot_endpoint: &str, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state, bot_endpoint);

    let addr = format!("{bind}:{port}");
    info!("altbot listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState, bot_endpoint: &str) -> Router {
    let mut router = Router::new()
        .route("/", get(health))
        .route("/health", get(health));

    let endpoint = bot_endpoint.trim_matches('/');
    if endpoint.is_empty() {
        info!("BOT_ENDPOINT not set; reconciliation endpoint disabled");
    } else if is_valid_endpoint(endpoint) {
        router = router.route(&format!("/{endpoint}"), get(trigger_reconcile));
    } else {
        warn!(endpoint = endpoint, "Ignoring BOT_ENDPOINT with unsupported characters");
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Plain path segments only: letters, digits, '-', '_', '.', and '/'
/// between segments.
pub fn is_valid_endpoint(endpoint: &str) -> bool {
    !endpoint.is_empty()
        && endpoint
            .split('/')
            .all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            })
}

/// Liveness check — always returns 200 OK.
async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// Run one reconciliation pass and report what it did.
async fn trigger_reconcile(State(state): State<AppState>) -> Response {
    match reconcile::reconcile(state.api.as_ref(), state.concurrency).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!(error = %e, "Reconciliation failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("{e:#}"))
        }
    }
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
