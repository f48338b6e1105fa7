use crate::errors::EngineResult;
use crate::models::heatmap::{self, HeatMapGrid};
use crate::models::{OptionParameters, PricingResult};
use crate::state::{AppState, StreamMessage};
use axum::extract::State;
use axum::response::Json;
use portable_atomic::Ordering;
use std::sync::Arc;

/// POST /pricing -- single-point price + Greeks (pure, runs inline)
pub async fn post_pricing(
    State(state): State<Arc<AppState>>,
    Json(params): Json<OptionParameters>,
) -> EngineResult<Json<PricingResult>> {
    state.counters.pricing_requests.fetch_add(1, Ordering::Relaxed);

    let result = state
        .model
        .price(&params)
        .inspect_err(|_| {
            state.counters.rejected_requests.fetch_add(1, Ordering::Relaxed);
        })?;

    Ok(Json(result))
}

/// POST /heatmap -- 20x20 spot/vol grid (rayon fan-out, kept off the async workers)
pub async fn post_heatmap(
    State(state): State<Arc<AppState>>,
    Json(params): Json<OptionParameters>,
) -> EngineResult<Json<HeatMapGrid>> {
    state.counters.heatmap_requests.fetch_add(1, Ordering::Relaxed);

    let model = state.model.clone();
    let grid = tokio::task::spawn_blocking(move || heatmap::sweep(model.as_ref(), &params))
        .await?
        .inspect_err(|_| {
            state.counters.rejected_requests.fetch_add(1, Ordering::Relaxed);
        })?;

    Ok(Json(grid))
}

/// GET /api/latest -- last tick pushed to /ws (from watch channel, no lock)
pub async fn get_latest(
    State(state): State<Arc<AppState>>,
) -> Json<Option<StreamMessage>> {
    let latest = state.latest_rx.borrow().clone();
    Json(latest)
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(
    State(state): State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    Json(state.counters.to_json())
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "model": state.model.name(),
    }))
}
