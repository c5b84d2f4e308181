//! Mock LLM client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage};

type ResponseHandler = Box<dyn Fn(&CompletionRequest) -> String + Send + Sync>;

/// Scripted LLM client.
///
/// Replies come from the queue filled by [`push_response`](Self::push_response)
/// and [`push_error`](Self::push_error) first, then from the handler set by
/// [`set_handler`](Self::set_handler). With neither, the call fails. Every
/// request is recorded. Each reply reports 10 input and 5 output tokens.
///
/// Methods are synchronous so tests can script the mock without awaiting.
pub struct MockLlmClient {
    queue: Mutex<VecDeque<Result<String, LlmError>>>,
    handler: Mutex<Option<ResponseHandler>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl std::fmt::Debug for MockLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLlmClient")
            .field("queued", &lock(&self.queue).len())
            .field("requests", &lock(&self.requests).len())
            .finish()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock, recovering from poison.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            handler: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        }
    }

    /// Queue a text reply.
    pub fn push_response(&self, text: &str) {
        lock(&self.queue).push_back(Ok(text.to_string()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: LlmError) {
        lock(&self.queue).push_back(Err(error));
    }

    /// Answer requests not covered by the queue.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&CompletionRequest) -> String + Send + Sync + 'static,
    {
        *lock(&self.handler) = Some(Box::new(handler));
    }

    /// Delay every reply by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn next_reply(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        if let Some(reply) = lock(&self.queue).pop_front() {
            return reply;
        }
        match lock(&self.handler).as_ref() {
            Some(handler) => Ok(handler(request)),
            None => Err(LlmError::Api {
                status: 500,
                message: "no scripted response".to_string(),
            }),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        lock(&self.requests).push(request.clone());

        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let text = self.next_reply(&request)?;
        Ok(CompletionResponse {
            text,
            usage: LlmUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
            model: "mock-model".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_before_handler() {
        let client = MockLlmClient::new();
        client.push_response("queued");
        client.set_handler(|request| format!("handled: {}", request.prompt));

        let first = client.complete(CompletionRequest::new("a")).await.unwrap();
        let second = client.complete(CompletionRequest::new("b")).await.unwrap();

        assert_eq!(first.text, "queued");
        assert_eq!(second.text, "handled: b");
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn test_unscripted_call_fails() {
        let client = MockLlmClient::new();
        let result = client.complete(CompletionRequest::new("a")).await;
        assert!(matches!(result, Err(LlmError::Api { status: 500, .. })));
        assert_eq!(client.requests()[0].prompt, "a");
    }
}
