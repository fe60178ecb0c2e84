use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("pool exhausted: {0}")]
    PoolExhausted(#[from] r2d2::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for flowline_core::FlowlineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(m) => flowline_core::FlowlineError::NotFound(m),
            StoreError::Conflict(m) => flowline_core::FlowlineError::Conflict(m),
            StoreError::InvalidRequest(m) => flowline_core::FlowlineError::InvalidRequest(m),
            StoreError::PoolExhausted(e) => {
                flowline_core::FlowlineError::ResourceExhausted(e.to_string())
            }
            StoreError::Database(e) => flowline_core::FlowlineError::StoreFailure(e.to_string()),
            StoreError::Serialization(e) => {
                flowline_core::FlowlineError::StoreFailure(e.to_string())
            }
        }
    }
}
