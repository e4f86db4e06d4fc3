use async_trait::async_trait;
use crate::providers::traits::{http_client, CompletionClient, CompletionRequest, TransportError};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

/// Any endpoint speaking the OpenAI chat-completions wire shape
/// (DeepSeek, OpenRouter, Mistral, local gateways).
#[derive(Clone)]
pub struct CompatibleProvider {
    api_key: String,
    api_url: String,
    client: Client,
    model: String,
    timeout: Duration,
}

impl CompatibleProvider {
    pub fn new(
        api_key: String,
        api_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            api_key,
            api_url,
            client: http_client(timeout)?,
            model,
            timeout,
        })
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": request.system_role
                },
                {
                    "role": "user",
                    "content": request.prompt
                }
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens
        })
    }
}

fn status_error(status: StatusCode, body: String) -> TransportError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Auth(body),
        StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited,
        _ => TransportError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

/// Pulls `choices[0].message.content` out of a chat-completions body.
fn extract_content(response_json: &Value) -> Result<String, TransportError> {
    if let Some(error) = response_json.get("error") {
        return Err(TransportError::Api(error.to_string()));
    }

    response_json
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| {
            TransportError::MalformedResponse("missing choices[0].message.content".to_string())
        })
}

#[async_trait]
impl CompletionClient for CompatibleProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| TransportError::from_http(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_http(e, self.timeout))?;
        let response_json: Value = serde_json::from_str(&body)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        extract_content(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
