use async_trait::async_trait;
use crate::providers::traits::{http_client, CompletionClient, CompletionRequest, TransportError};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use std::time::Duration;

#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    chat_model: String,
    timeout: Duration,
}

impl OpenAIProvider {
    pub fn new(
        api_key: String,
        chat_model: String,
        api_base: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client(timeout)?),
            chat_model,
            timeout,
        })
    }

    fn transport_error(&self, err: OpenAIError) -> TransportError {
        match err {
            OpenAIError::Reqwest(e) => TransportError::from_http(e, self.timeout),
            other => other.into(),
        }
    }
}

impl From<OpenAIError> for TransportError {
    fn from(err: OpenAIError) -> Self {
        match err {
            OpenAIError::Reqwest(e) => TransportError::Network(e.to_string()),
            OpenAIError::ApiError(e) => TransportError::Api(e.message),
            OpenAIError::JSONDeserialize(e) => TransportError::MalformedResponse(e.to_string()),
            other => TransportError::Other(other.to_string()),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAIProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_role.as_str())
            .build()?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(request.prompt.as_str())
            .build()?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .messages(vec![system.into(), user.into()])
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| self.transport_error(e))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .ok_or_else(|| TransportError::MalformedResponse("No response content".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.chat_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    #[test]
    fn test_api_error_keeps_message() {
        let api_error: ApiError = serde_json::from_value(serde_json::json!({
            "message": "The model `gpt-9` does not exist",
            "type": "invalid_request_error",
            "param": null,
            "code": "model_not_found"
        }))
        .unwrap();

        match TransportError::from(OpenAIError::ApiError(api_error)) {
            TransportError::Api(message) => assert_eq!(message, "The model `gpt-9` does not exist"),
            other => panic!("unexpected mapping: {:?}", other),
        }
    }

    #[test]
    fn test_provider_builds_with_timeout() {
        let provider = OpenAIProvider::new(
            "sk-test".to_string(),
            "gpt-3.5-turbo".to_string(),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(provider.model_name(), "gpt-3.5-turbo");
    }
}
