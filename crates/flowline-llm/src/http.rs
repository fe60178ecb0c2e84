//! Production `LlmClient`: an OpenAI-compatible `/chat/completions` caller
//! with connect/timeout errors mapped to `LlmError::Unavailable`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use flowline_core::ids::CallId;
use flowline_store::{LlmCall, Store};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::{CompletionRequest, LlmClient};
use crate::error::LlmError;

pub struct HttpLlmClient {
    client: reqwest::Client,
    store: Store,
    base_url: String,
    api_key: String,
    default_model: String,
    timeout: Duration,
}

impl HttpLlmClient {
    pub fn new(
        store: Store,
        base_url: String,
        api_key: String,
        default_model: String,
        timeout_ms: u64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            store,
            base_url,
            api_key,
            default_model,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn send(&self, request: &CompletionRequest) -> Result<(String, String), LlmError> {
        let model = request.model.clone().unwrap_or_else(|| self.default_model.clone());
        let body = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt},
            ],
        });

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(%model, call_type = request.call_type.as_str(), "sending request to LLM backend");

        let send = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        let resp = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    LlmError::Unavailable(e.to_string())
                } else {
                    LlmError::Http(e.to_string())
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "LLM backend returned an error");
            return Err(LlmError::Api { status, message: text });
        }

        let parsed: ChatCompletionResponse =
            resp.json().await.map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("no choices in response".to_string()))?;

        Ok((text, model))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: CompletionRequest) -> (CallId, Result<String, LlmError>) {
        let call_id = CallId::new();
        let result = self.send(&request).await;

        let (response_text, error_text) = match &result {
            Ok((text, _)) => (text.clone(), None),
            Err(e) => (String::new(), Some(e.to_string())),
        };

        let record = LlmCall {
            call_id: call_id.clone(),
            business_id: request.business_id.clone(),
            input_text: request.user_prompt.clone(),
            response: response_text,
            system_prompt: Some(request.system_prompt.clone()),
            call_type: request.call_type.as_str().to_string(),
            error: error_text,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.store.record_llm_call(&record) {
            warn!(error = %e, "failed to persist LLM call trace");
        }

        (call_id, result.map(|(text, _)| text))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}
