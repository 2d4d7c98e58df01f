//! Axum router wiring.
//!
//! - `<ws_path>` (default `/ws`): browser WebSocket upgrade
//! - `/healthz`, `/readyz`, `/metrics`: ops
//! - everything else: static diagram-viewer bundle

use axum::{routing::get, Router};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    let ws_path = state.cfg().browser.ws_path.clone();
    Router::new()
        .route(&ws_path, get(transport::browser::ws_upgrade))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .fallback(transport::assets::serve_asset)
        .with_state(state)
}
