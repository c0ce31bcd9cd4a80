//! Small debug/health HTTP surface, mirroring Ambassador's `pkg/debug`
//! timers and the teacher's axum `Router` wiring in `ferrex-server::main`.
//!
//! Three routes: `/healthz` (liveness), `/debug/snapshot` (dumps the
//! currently-published snapshot verbatim), `/debug/timers` (cumulative
//! per-phase iteration timing).

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use meshwatch_core::timers::IterationTimers;
use meshwatch_core::SharedSnapshot;
use serde::Serialize;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
struct DebugState {
    published: SharedSnapshot,
    timers: IterationTimers,
}

pub fn router(published: SharedSnapshot, timers: IterationTimers) -> Router {
    let state = DebugState { published, timers };
    Router::new()
        .route("/healthz", get(healthz))
        .route("/debug/snapshot", get(snapshot))
        .route("/debug/timers", get(timer_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn snapshot(State(state): State<DebugState>) -> impl IntoResponse {
    let body = state.published.read().await.clone();
    if body.is_empty() {
        return (StatusCode::SERVICE_UNAVAILABLE, "no snapshot published yet\n".to_string()).into_response();
    }
    ([("content-type", "application/json")], body).into_response()
}

#[derive(Serialize)]
struct TimerStatsView {
    count: u64,
    total_ms: u128,
    last_ms: u128,
}

async fn timer_stats(State(state): State<DebugState>) -> impl IntoResponse {
    let view: BTreeMap<&'static str, TimerStatsView> = state
        .timers
        .snapshot()
        .into_iter()
        .map(|(name, stats)| {
            (name, TimerStatsView { count: stats.count, total_ms: stats.total.as_millis(), last_ms: stats.last.as_millis() })
        })
        .collect();
    Json(view)
}
