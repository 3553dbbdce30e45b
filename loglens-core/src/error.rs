use thiserror::Error;

/// Unified error type for loglens.
#[derive(Error, Debug)]
pub enum LoglensError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Internal: {0}")]
    Internal(String),
}

impl LoglensError {
    /// Map to HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            LoglensError::InvalidArgument(_) => 400,
            _ => 500,
        }
    }

    /// JSON error body.
    pub fn to_json_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.to_string(),
            "status": self.status_code(),
        })
    }
}
