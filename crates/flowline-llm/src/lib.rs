pub mod client;
pub mod error;
pub mod http;
pub mod mock;

pub use client::{CallType, CompletionRequest, LlmClient};
pub use error::{LlmError, Result};
pub use http::HttpLlmClient;
pub use mock::MockLlmClient;
