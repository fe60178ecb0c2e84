use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Top-level error kind, per the error-handling taxonomy: every narrower
/// per-crate error type converts into this at the boundary where it is
/// turned into an HTTP response.
#[derive(Debug, Error)]
pub enum FlowlineError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("busy, retry after {retry_after_secs}s")]
    Busy { retry_after_secs: u64 },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("LLM call failed: {0}")]
    LlmFailure(String),

    #[error("store failure: {0}")]
    StoreFailure(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FlowlineError {
    /// Short error code string sent to clients in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            FlowlineError::Unauthorized => "UNAUTHORIZED",
            FlowlineError::Forbidden => "FORBIDDEN",
            FlowlineError::InvalidRequest(_) => "INVALID_REQUEST",
            FlowlineError::NotFound(_) => "NOT_FOUND",
            FlowlineError::Conflict(_) => "CONFLICT",
            FlowlineError::Busy { .. } => "BUSY",
            FlowlineError::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            FlowlineError::LlmFailure(_) => "LLM_FAILURE",
            FlowlineError::StoreFailure(_) => "STORE_FAILURE",
            FlowlineError::Config(_) => "CONFIG_ERROR",
            FlowlineError::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP status code this error kind maps to, per the error taxonomy.
    pub fn status(&self) -> u16 {
        match self {
            FlowlineError::Unauthorized => 401,
            FlowlineError::Forbidden => 403,
            FlowlineError::InvalidRequest(_) => 400,
            FlowlineError::NotFound(_) => 404,
            FlowlineError::Conflict(_) => 409,
            FlowlineError::Busy { .. } => 429,
            FlowlineError::ResourceExhausted(_) => 503,
            FlowlineError::LlmFailure(_) => 500,
            FlowlineError::StoreFailure(_) => 500,
            FlowlineError::Config(_) => 500,
            FlowlineError::Internal(_) => 500,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

/// Converts every error kind to its taxonomy-mandated HTTP status + JSON
/// body, logging once at this boundary with the error kind (request id and
/// tenant id are attached by the tracing span the caller is in).
impl IntoResponse for FlowlineError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        tracing::warn!(code = self.code(), status = status.as_u16(), error = %self, "request failed");

        let body = Json(ErrorBody {
            error: self.code(),
            message: self.to_string(),
        });

        if let FlowlineError::Busy { retry_after_secs } = &self {
            return (
                status,
                [("Retry-After", retry_after_secs.to_string())],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, FlowlineError>;
