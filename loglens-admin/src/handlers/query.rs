use crate::error::ApiError;
use crate::server::ApiState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use loglens_core::record::{RequestRecord, SlimRecord};
use loglens_store::{LogsParams, StatsParams};
use std::sync::Arc;
use std::time::Instant;

/// `GET /api/stats`: slim records in `[start, end]`, ascending.
pub async fn stats(
    State(state): State<Arc<ApiState>>,
    params: Result<Query<StatsParams>, QueryRejection>,
) -> Result<Json<Vec<SlimRecord>>, ApiError> {
    let started = Instant::now();
    let result = match params {
        Ok(Query(params)) => state.query.stats(&params).await.map_err(ApiError::from),
        Err(rejection) => Err(rejection.into()),
    };
    observe(&state, "stats", started, &result);
    result.map(Json)
}

/// `GET /api/logs`: most recent full records, newest first.
pub async fn logs(
    State(state): State<Arc<ApiState>>,
    params: Result<Query<LogsParams>, QueryRejection>,
) -> Result<Json<Vec<RequestRecord>>, ApiError> {
    let started = Instant::now();
    let result = match params {
        Ok(Query(params)) => state.query.logs(&params).await.map_err(ApiError::from),
        Err(rejection) => Err(rejection.into()),
    };
    observe(&state, "logs", started, &result);
    result.map(Json)
}

fn observe<T>(state: &ApiState, endpoint: &str, started: Instant, result: &Result<T, ApiError>) {
    let status = match result {
        Ok(_) => 200,
        Err(e) => e.status().as_u16(),
    };
    state
        .metrics
        .record_api_request(endpoint, status, started.elapsed().as_secs_f64());
}
