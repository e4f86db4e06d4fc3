use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// One chat-style completion call: a system role, a user prompt and the
/// sampling knobs for this particular call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_role: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u16,
}

impl CompletionRequest {
    pub fn new(system_role: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_role: system_role.into(),
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u16) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Failure to get text back from the completion service.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Authentication rejected: {0}")]
    Auth(String),
    #[error("Rate limited by completion service")]
    RateLimited,
    #[error("Completion service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Completion service error: {0}")]
    Api(String),
    #[error("Malformed response envelope: {0}")]
    MalformedResponse(String),
    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Short label that is safe to show to end users.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Network(_) => "network error",
            TransportError::Auth(_) => "authentication error",
            TransportError::RateLimited => "rate limited",
            TransportError::Status { .. } => "unexpected status",
            TransportError::Api(_) => "service error",
            TransportError::MalformedResponse(_) => "malformed response",
            TransportError::Timeout(_) => "timed out",
            TransportError::Other(_) => "transport error",
        }
    }
}

impl TransportError {
    /// Classifies an HTTP client error from a call bounded by `timeout`.
    pub fn from_http(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(timeout)
        } else if err.is_decode() {
            TransportError::MalformedResponse(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Shared HTTP client with a per-request deadline.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {}", e)))
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError>;

    fn model_name(&self) -> &str;
}
