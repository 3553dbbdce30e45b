use crate::server::ApiState;
use axum::extract::State;
use axum::response::Json;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;

pub async fn health_check(State(state): State<Arc<ApiState>>) -> Json<Value> {
    let records = match state.query.record_count().await {
        Ok(n) => Some(n),
        Err(e) => {
            warn!(error = %e, "health: store unavailable");
            None
        }
    };
    let tailer = state.tailer.as_ref().map(|t| t.status());

    Json(json!({
        "status": if records.is_some() { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "tailer": tailer,
        "store": { "records": records },
    }))
}
