use thiserror::Error;

/// Error kinds for the single `complete` contract this crate exposes — no
/// streaming, no tool calls.
#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("LLM backend unavailable: {0}")]
    Unavailable(String),

    #[error("LLM call timed out after {0}ms")]
    Timeout(u64),

    #[error("LLM call cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, LlmError>;

impl From<LlmError> for flowline_core::FlowlineError {
    fn from(e: LlmError) -> Self {
        flowline_core::FlowlineError::LlmFailure(e.to_string())
    }
}
