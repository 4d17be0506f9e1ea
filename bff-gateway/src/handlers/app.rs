use crate::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// Liveness. Always 200; bus state is informational.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let bus = if state.gateway.is_connected() {
        "connected"
    } else {
        "disconnected"
    };

    Json(json!({
        "status": "ok",
        "service": &*state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "bus": bus,
    }))
}
