//! LLMClient — `Complete(systemPrompt, userPrompt, opts) -> (text,
//! callId, err)`, a single non-streaming completion call with no
//! client-side retries and no provider fan-out.

use async_trait::async_trait;
use flowline_core::ids::{BusinessId, CallId};

use crate::error::LlmError;

/// Which pipeline phase is making the call — recorded alongside the call
/// trace and used by the mock client to pick a canned response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Selection,
    Extraction,
    Generation,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Selection => "selection",
            CallType::Extraction => "extraction",
            CallType::Generation => "generation",
        }
    }
}

/// One completion request. `model` overrides the client's configured
/// default when set.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub business_id: BusinessId,
    pub system_prompt: String,
    pub user_prompt: String,
    pub call_type: CallType,
    pub model: Option<String>,
}

/// Common interface for all LLM backends. Exactly one request per `complete`
/// call — no client-side retries, callers decide whether to retry. Every
/// implementation MUST persist the call via `Store.RecordLLMCall` before
/// returning, success or failure, which is why `call_id` is always
/// available even in the `Err` branch.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> (CallId, Result<String, LlmError>);
}
