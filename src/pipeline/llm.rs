//! Completion boundary: one prompt in, generated text out.
//!
//! [`CompletionClient`] takes a system instruction and a user prompt, nothing
//! else: no conversation state is carried between stage calls.
//!
//! ## Retry Strategy
//!
//! [`LlmCompletionClient`] retries failed calls with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`): with 500 ms base and 3 retries the
//! wait sequence is 500 ms → 1 s → 2 s. Each attempt is bounded by
//! `api_timeout_secs`. An empty answer is not retried.

use crate::config::PipelineConfig;
use crate::error::CompletionError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Generated text plus accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Retries spent before this answer arrived.
    pub retries: u32,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Sends a prompt to a text-generation service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        system_instruction: &str,
        user_prompt: &str,
    ) -> Result<Completion, CompletionError>;
}

/// [`CompletionClient`] over any edgequake-llm provider.
pub struct LlmCompletionClient {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl LlmCompletionClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`,
/// saturating rather than overflowing for large retry counts.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// What went wrong on the last attempt.
enum AttemptFailure {
    RateLimited,
    Timeout,
    Api(String),
}

#[async_trait]
impl CompletionClient for LlmCompletionClient {
    async fn complete(
        &self,
        system_instruction: &str,
        user_prompt: &str,
    ) -> Result<Completion, CompletionError> {
        let messages = vec![
            ChatMessage::system(system_instruction),
            ChatMessage::user(user_prompt),
        ];
        let options = self.build_options();
        let call_timeout = Duration::from_secs(self.api_timeout_secs);
        let start = Instant::now();

        let mut last_failure = AttemptFailure::Api("no attempt made".to_string());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Completion retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(call_timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Completion: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    if response.content.trim().is_empty() {
                        return Err(CompletionError::EmptyResponse);
                    }
                    return Ok(Completion {
                        text: response.content,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                        retries: attempt,
                    });
                }
                Ok(Err(e)) => {
                    let detail = e.to_string();
                    warn!("Completion attempt {} failed: {}", attempt + 1, detail);
                    last_failure = if is_rate_limit(&detail) {
                        AttemptFailure::RateLimited
                    } else {
                        AttemptFailure::Api(detail)
                    };
                }
                Err(_) => {
                    warn!(
                        "Completion attempt {} timed out after {}s",
                        attempt + 1,
                        self.api_timeout_secs
                    );
                    last_failure = AttemptFailure::Timeout;
                }
            }
        }

        Err(match last_failure {
            AttemptFailure::RateLimited => CompletionError::RateLimited {
                retries: self.max_retries,
            },
            AttemptFailure::Timeout => CompletionError::Timeout {
                secs: self.api_timeout_secs,
            },
            AttemptFailure::Api(detail) => CompletionError::Api {
                retries: self.max_retries,
                detail,
            },
        })
    }
}

/// Provider errors are stringly typed across backends; HTTP 429 shows up in
/// the message text.
fn is_rate_limit(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detection() {
        assert!(is_rate_limit("HTTP 429 Too Many Requests"));
        assert!(is_rate_limit("Rate limit reached for gpt-4.1-nano"));
        assert!(is_rate_limit("error code: rate_limit_exceeded"));
        assert!(!is_rate_limit("invalid api key"));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1_000);
        assert_eq!(backoff_ms(500, 4), 4_000);
        assert_eq!(backoff_ms(500, 70), u64::MAX);
        assert_eq!(backoff_ms(u64::MAX / 2, 3), u64::MAX);
    }

    #[test]
    fn completion_new_has_zero_accounting() {
        let c = Completion::new("hello");
        assert_eq!(c.text, "hello");
        assert_eq!(c.input_tokens, 0);
        assert_eq!(c.retries, 0);
    }
}
