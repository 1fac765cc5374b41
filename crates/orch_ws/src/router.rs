//! Top-level axum router: the frame-protocol upgrade plus the liveness
//! endpoints a scheduler probes before routing traffic to this process.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::app::AppState;
use crate::handler::ws_handler;

pub fn build_router(app: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
        .with_state(app)
}
