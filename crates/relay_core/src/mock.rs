//! Scripted completion provider for testing.
//!
//! Returns predefined responses and records every call, so executor behavior
//! can be verified without a model backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;

use crate::cancel::CancelToken;
use crate::error::{CoreError, CoreResult};
use crate::provider::{CompletionProvider, CompletionRequest, CompletionStream};

/// Predefined response for one completion call.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponse {
    /// Increments streamed in order
    pub chunks: Vec<String>,
    /// Error delivered after the chunks
    pub failure: Option<String>,
    /// Never finish after the chunks
    pub hold: bool,
}

impl ScriptedResponse {
    /// A single-chunk response.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            chunks: vec![text.into()],
            ..Self::default()
        }
    }

    /// A response streamed as `chunks`; atomic calls get them joined.
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Fail with `message` once the chunks are delivered.
    pub fn fail_after(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Stall forever once the chunks are delivered.
    pub fn hold(mut self) -> Self {
        self.hold = true;
        self
    }

    fn joined(&self) -> String {
        self.chunks.concat()
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    /// `complete` or `complete_streaming`
    pub method: String,
    pub request: CompletionRequest,
}

/// Scripted completion provider.
///
/// Responses are handed out in order and cycle once exhausted. With no
/// responses configured the provider echoes its input.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    /// Responses handed out in call order
    responses: Arc<RwLock<Vec<ScriptedResponse>>>,
    /// Index of the next response
    response_index: Arc<AtomicUsize>,
    /// Every call received, oldest first
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    /// Error returned before any output
    simulate_failure: Arc<RwLock<Option<String>>>,
    /// Pause before each streamed chunk
    chunk_delay: Arc<RwLock<Option<Duration>>>,
}

impl ScriptedProvider {
    /// Create a provider that echoes its input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a response for the next call.
    pub fn add_response(self, response: ScriptedResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    /// Set multiple responses.
    pub fn with_responses(self, responses: Vec<ScriptedResponse>) -> Self {
        *self.responses.write() = responses;
        self
    }

    /// Fail every call before any output is produced.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// Sleep before each streamed chunk.
    pub fn with_chunk_delay(self, delay: Duration) -> Self {
        *self.chunk_delay.write() = Some(delay);
        self
    }

    /// Forget captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// All captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Number of calls of either kind.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Check whether `method` was called at least once.
    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls.read().iter().any(|c| c.method == method)
    }

    /// Captured calls of one method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    fn record_call(&self, method: &str, request: &CompletionRequest) {
        self.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            request: request.clone(),
        });
    }

    fn next_response(&self, request: &CompletionRequest) -> ScriptedResponse {
        let responses = self.responses.read();
        if responses.is_empty() {
            return ScriptedResponse::text(format!("echo: {}", request.input));
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses[index % responses.len()].clone()
    }

    fn check_failure(&self) -> CoreResult<()> {
        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(CoreError::Provider(msg));
        }
        Ok(())
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> CoreResult<String> {
        self.record_call("complete", request);
        self.check_failure()?;

        let response = self.next_response(request);
        if response.hold {
            std::future::pending::<()>().await;
        }
        if let Some(msg) = response.failure {
            return Err(CoreError::Provider(msg));
        }
        Ok(response.joined())
    }

    async fn complete_streaming(
        &self,
        request: &CompletionRequest,
        _cancel: CancelToken,
    ) -> CoreResult<CompletionStream> {
        self.record_call("complete_streaming", request);
        self.check_failure()?;

        let response = self.next_response(request);
        let delay = *self.chunk_delay.read();

        let chunks = stream::iter(response.chunks).then(move |chunk| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, CoreError>(chunk)
        });
        let tail = stream::iter(response.failure.map(|msg| Err(CoreError::Provider(msg))));

        let stream = chunks.chain(tail);
        if response.hold {
            Ok(stream.chain(stream::pending()).boxed())
        } else {
            Ok(stream.boxed())
        }
    }
}
