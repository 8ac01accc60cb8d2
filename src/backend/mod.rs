//! Text-generation backend layer
//! - backend trait and request types (this file)
//! - error.rs: BackendError
//! - registry.rs: named backends with one selected
//! - prompts.rs: prompt text shared by the HTTP backends
//! - extract.rs: pulling code out of fenced chat answers
//! - openai.rs: OpenAI responses API
//! - anthropic.rs: Anthropic messages API

pub mod anthropic;
pub mod error;
pub mod extract;
pub mod openai;
pub mod prompts;
pub mod registry;

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

pub use anthropic::AnthropicBackend;
pub use error::BackendError;
pub use openai::OpenAiBackend;
pub use registry::BackendRegistry;

use crate::util::text::dedup_preserving_order;

/// Point in time by which a backend call has to be finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Runs `call`, failing with [`BackendError::Timeout`] once the deadline passes
    pub async fn run<T, F>(self, call: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        tokio::time::timeout_at(self.at, call)
            .await
            .unwrap_or(Err(BackendError::Timeout(self.budget)))
    }
}

/// Code around the cursor sent for completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionRequest {
    pub content_before: String,
    pub content_after: String,
    /// Shared by every suggestion attempt of this request
    pub deadline: Option<Deadline>,
}

/// A selection plus the instruction to apply to it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    pub instruction: String,
    pub content: String,
}

/// Capability every text-generation backend provides
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Produces up to `count` distinct raw suggestions for the cursor position
    ///
    /// # Returns
    /// * `Ok(suggestions)` - Raw generated strings, possibly fewer than `count`
    /// * `Err(BackendError)` - If not a single suggestion could be produced
    async fn completion(
        &self,
        request: &CompletionRequest,
        file_path: &str,
        language_id: &str,
        count: usize,
    ) -> Result<Vec<String>, BackendError>;

    /// Rewrites a selection according to an instruction
    async fn chat(
        &self,
        request: &ChatRequest,
        file_path: &str,
        language_id: &str,
    ) -> Result<String, BackendError>;
}

/// Requests `count` suggestions one after another.
///
/// A failure after at least one success ends the loop and keeps what was
/// collected; a failure on the first attempt is returned as the error. An
/// attempt still running at `deadline` counts as a failed attempt.
/// Duplicate suggestions are removed, keeping the first occurrence.
pub async fn collect_suggestions<F, Fut>(
    count: usize,
    deadline: Option<Deadline>,
    mut attempt: F,
) -> Result<Vec<String>, BackendError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<String>, BackendError>>,
{
    let mut results = Vec::with_capacity(count);

    for index in 0..count {
        let outcome = match deadline {
            Some(deadline) => deadline.run(attempt(index)).await,
            None => attempt(index).await,
        };
        match outcome {
            Ok(texts) => results.extend(texts.into_iter().filter(|text| !text.is_empty())),
            Err(e) if !results.is_empty() => {
                warn!(
                    "Suggestion {} of {} failed, keeping {} earlier results: {}",
                    index + 1,
                    count,
                    results.len(),
                    e
                );
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(dedup_preserving_order(results))
}
