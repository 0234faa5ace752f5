//! LLM Provider trait

use crate::types::{LlmRequest, StreamDelta};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("context overflow: {0}")]
    ContextOverflow(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl LlmError {
    /// Convert into the engine error, tagging the provider that failed.
    pub fn into_core(self, provider: &str) -> interlude_core::Error {
        match self {
            LlmError::Cancelled => interlude_core::Error::Cancelled,
            other => interlude_core::Error::reasoner(provider, other.to_string()),
        }
    }
}

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn models(&self) -> &[&str];

    fn supports_model(&self, model: &str) -> bool {
        self.models()
            .iter()
            .any(|m| *m == model || model.starts_with(m))
    }

    /// Stream a completion response. If `cancel` is provided and triggered,
    /// the underlying connection is dropped and the stream yields `LlmError::Cancelled`.
    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream>;
}

/// Race a delta stream against a cancellation token. After cancellation the
/// inner stream is dropped and a single `Cancelled` error is yielded.
pub fn with_cancel(inner: LlmStream, cancel: Option<CancellationToken>) -> LlmStream {
    let Some(cancel) = cancel else {
        return inner;
    };
    Box::pin(async_stream::stream! {
        let mut inner = inner;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = inner.next() => Some(next),
            };
            match next {
                None => {
                    yield Err(LlmError::Cancelled);
                    break;
                }
                Some(Some(item)) => yield item,
                Some(None) => break,
            }
        }
    })
}
