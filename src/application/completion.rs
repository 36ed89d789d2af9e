// Text completion capability used by the language-model forecast
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Errors from a text completion call. The forecast engine treats every
/// variant as "capability unavailable" for the current invocation.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion capability not configured")]
    NotConfigured,
    #[error("completion transport error: {0}")]
    Transport(String),
    #[error("completion API returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed completion response: {0}")]
    Malformed(String),
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        CompletionError::Transport(e.to_string())
    }
}

#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Return the raw text a model produced for `prompt`
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    fn name(&self) -> &str;
}

/// Bounds another completion capability with a deadline
pub struct TimeoutCompletion {
    inner: Arc<dyn TextCompletion>,
    timeout: Duration,
}

impl TimeoutCompletion {
    pub fn new(inner: Arc<dyn TextCompletion>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl TextCompletion for TimeoutCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(self.timeout)),
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
