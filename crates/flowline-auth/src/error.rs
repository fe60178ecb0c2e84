use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("store error: {0}")]
    Store(#[from] flowline_store::StoreError),
}

pub type Result<T> = std::result::Result<T, AuthError>;

impl From<AuthError> for flowline_core::FlowlineError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized => flowline_core::FlowlineError::Unauthorized,
            AuthError::Forbidden(_) => flowline_core::FlowlineError::Forbidden,
            AuthError::RateLimited { retry_after_secs } => {
                flowline_core::FlowlineError::Busy { retry_after_secs }
            }
            AuthError::Store(e) => e.into(),
        }
    }
}
