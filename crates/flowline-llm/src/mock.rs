//! Deterministic `LlmClient` for tests and local development — no network,
//! canned text keyed by `CallType`, still recorded through `Store` like a
//! real backend so pipeline tests see a realistic `llm_calls` trail.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use flowline_core::ids::CallId;
use flowline_store::{LlmCall, Store};
use tracing::warn;

use crate::client::{CallType, CompletionRequest, LlmClient};
use crate::error::LlmError;

pub struct MockLlmClient {
    store: Store,
    responses: HashMap<&'static str, String>,
}

impl MockLlmClient {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            responses: HashMap::new(),
        }
    }

    /// Overrides the canned response for a call type.
    pub fn with_response(mut self, call_type: CallType, text: impl Into<String>) -> Self {
        self.responses.insert(call_type.as_str(), text.into());
        self
    }

    fn canned(&self, call_type: CallType) -> String {
        if let Some(text) = self.responses.get(call_type.as_str()) {
            return text.clone();
        }
        match call_type {
            CallType::Selection => "greeting, confidence: 0.9".to_string(),
            CallType::Extraction => "{}".to_string(),
            CallType::Generation => "Thanks for reaching out — how can I help?".to_string(),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> (CallId, Result<String, LlmError>) {
        let call_id = CallId::new();
        let text = self.canned(request.call_type);

        let record = LlmCall {
            call_id: call_id.clone(),
            business_id: request.business_id,
            input_text: request.user_prompt,
            response: text.clone(),
            system_prompt: Some(request.system_prompt),
            call_type: request.call_type.as_str().to_string(),
            error: None,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.store.record_llm_call(&record) {
            warn!(error = %e, "failed to persist mock LLM call trace");
        }

        (call_id, Ok(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::ids::BusinessId;

    #[tokio::test]
    async fn complete_returns_canned_text_and_records_call() {
        let store = Store::open(":memory:", 4, 1_000).unwrap();
        let client = MockLlmClient::new(store.clone());
        let business_id = BusinessId::new();

        let (call_id, result) = client
            .complete(CompletionRequest {
                business_id: business_id.clone(),
                system_prompt: "system".into(),
                user_prompt: "hello".into(),
                call_type: CallType::Generation,
                model: None,
            })
            .await;

        let text = result.unwrap();
        assert_eq!(text, "Thanks for reaching out — how can I help?");

        let calls = store.list_llm_calls(&business_id, 10).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_id.to_string(), call_id.to_string());
        assert_eq!(calls[0].call_type, "generation");
    }

    #[tokio::test]
    async fn with_response_overrides_default() {
        let store = Store::open(":memory:", 4, 1_000).unwrap();
        let client =
            MockLlmClient::new(store).with_response(CallType::Selection, "checkout, confidence: 0.5");

        let (_, result) = client
            .complete(CompletionRequest {
                business_id: BusinessId::new(),
                system_prompt: "system".into(),
                user_prompt: "hi".into(),
                call_type: CallType::Selection,
                model: None,
            })
            .await;

        assert_eq!(result.unwrap(), "checkout, confidence: 0.5");
    }
}
