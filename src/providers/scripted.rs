//! In-process completion client with queued replies.
//!
//! Replies are handed out in order, one per call, and every request is
//! recorded so callers can assert on how many calls were made and what was
//! asked. When the queue runs dry the client fails with a transport error.

use crate::providers::traits::{CompletionClient, CompletionRequest, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, TransportError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(self, text: &str) -> Self {
        self.push(Ok(text.to_string()));
        self
    }

    /// Queue a failed call.
    pub fn fail(self, error: TransportError) -> Self {
        self.push(Err(error));
        self
    }

    fn push(&self, reply: Result<String, TransportError>) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted reply left".to_string())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
