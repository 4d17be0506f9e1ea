//! Warmup endpoints. Always 200; health lives in the body.

use crate::services::warmup::{WarmupMode, WarmupResult};
use crate::AppState;
use axum::{extract::State, Json};

/// `GET /system/warmup`: HTTP and bus probes concurrently.
pub async fn warmup_all(State(state): State<AppState>) -> Json<WarmupResult> {
    Json(state.warmup.run(WarmupMode::Full).await)
}

/// `GET /system/warmup/http`: HTTP probes only, to wake cold instances.
pub async fn warmup_http(State(state): State<AppState>) -> Json<WarmupResult> {
    Json(state.warmup.run(WarmupMode::HttpOnly).await)
}

/// `GET /system/warmup/bus`: bus pings only.
pub async fn warmup_bus(State(state): State<AppState>) -> Json<WarmupResult> {
    Json(state.warmup.run(WarmupMode::BusOnly).await)
}
