pub mod hub;
pub mod routes;
pub mod ws;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

/// HTTP + WS surface. Static dashboard files are served as the fallback when configured.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/pricing", post(routes::post_pricing))
        .route("/heatmap", post(routes::post_heatmap))
        .route("/health", get(routes::health))
        .route("/api/latest", get(routes::get_latest))
        .route("/api/counters", get(routes::get_counters))
        .route("/ws", get(ws::ws_handler));

    if let Some(dir) = &state.config.frontend_dir {
        tracing::info!(dir = %dir.display(), "serving dashboard");
        app = app.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        );
    }

    app.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
    .with_state(state)
}
