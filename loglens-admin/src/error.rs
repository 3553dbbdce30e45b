use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loglens_core::LoglensError;
use loglens_store::QueryError;

/// Handler error rendered as `{"error": ..., "status": ...}`.
#[derive(Debug)]
pub struct ApiError(pub LoglensError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self(err.into())
    }
}

impl From<LoglensError> for ApiError {
    fn from(err: LoglensError) -> Self {
        Self(err)
    }
}

/// A query string that does not decode is a bad argument like any other.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        LoglensError::InvalidArgument(rejection.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(self.0.to_json_body())).into_response()
    }
}
