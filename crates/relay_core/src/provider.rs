//! Completion provider interface.
//!
//! The executor only knows how to ask for text given a system prompt, an
//! input and a model id. Real model backends live outside this crate.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::CoreResult;

/// A lazy, finite, non-restartable sequence of output increments.
///
/// Each item is appended to the step output in order. An `Err` item ends
/// the stream early.
pub type CompletionStream = BoxStream<'static, CoreResult<String>>;

/// One completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub input: String,
    pub model_id: String,
}

impl CompletionRequest {
    pub fn new(
        system_prompt: impl Into<String>,
        input: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            input: input.into(),
            model_id: model_id.into(),
        }
    }
}

/// Turns `(system prompt, input, model)` into generated text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name, used in logs.
    fn name(&self) -> &str;

    /// Produce the whole completion at once.
    async fn complete(&self, request: &CompletionRequest) -> CoreResult<String>;

    /// Produce the completion incrementally.
    ///
    /// Providers that can abandon delivery should watch `cancel`. The default
    /// delivers the atomic completion as a single increment.
    async fn complete_streaming(
        &self,
        request: &CompletionRequest,
        cancel: CancelToken,
    ) -> CoreResult<CompletionStream> {
        let _ = cancel;
        let text = self.complete(request).await?;
        Ok(stream::once(async move { Ok(text) }).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &CompletionRequest) -> CoreResult<String> {
            Ok(format!("{}:{}", request.model_id, request.input))
        }
    }

    #[tokio::test]
    async fn test_default_streaming_yields_single_increment() {
        let provider = EchoProvider;
        let request = CompletionRequest::new("sys", "hello", "m1");

        let chunks: Vec<String> = provider
            .complete_streaming(&request, CancelToken::new())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks, vec!["m1:hello".to_string()]);
    }
}
