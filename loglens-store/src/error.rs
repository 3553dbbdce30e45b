use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
}

impl From<StoreError> for loglens_core::LoglensError {
    fn from(err: StoreError) -> Self {
        loglens_core::LoglensError::StoreError(err.to_string())
    }
}
