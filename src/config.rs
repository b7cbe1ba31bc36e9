//! Configuration for a batch run.
//!
//! All pipeline behaviour that is not part of the per-batch
//! [`crate::request::ProcessingRequest`] is controlled through
//! [`PipelineConfig`], built via its [`PipelineConfigBuilder`].
//!
//! The three collaborator slots (`extractor`, `completion_client`,
//! `artifact_writer`) default to the built-in pdfium extractor, the
//! edgequake-llm provider client and the Markdown file writer. Setting them
//! swaps in another implementation, e.g. in-memory fakes in tests.

use crate::error::DocStageError;
use crate::pipeline::artifact::ArtifactWriter;
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::llm::CompletionClient;
use crate::progress::{BatchProgressCallback, ProgressCallback};
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default cap on characters of document text embedded into any prompt.
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 15_000;

/// Configuration for a batch run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docstage::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .workers(8)
///     .model("gpt-4.1-mini")
///     .output_dir("reports")
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 8);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Number of documents processed concurrently. Default: 4.
    ///
    /// Each worker owns one document at a time and runs its stages in
    /// order, so this is also the upper bound on in-flight LLM calls.
    pub workers: usize,

    /// Maximum characters of extracted text embedded into a prompt. Default: 15 000.
    ///
    /// Text beyond this is silently dropped; later sections of long
    /// documents are never seen by the model.
    pub max_prompt_chars: usize,

    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Text extraction override. Default: pdfium.
    pub extractor: Option<Arc<dyn TextExtractor>>,

    /// Completion override. Takes precedence over every provider setting.
    pub completion_client: Option<Arc<dyn CompletionClient>>,

    /// Artifact persistence override. Default: Markdown files in `output_dir`.
    pub artifact_writer: Option<Arc<dyn ArtifactWriter>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens generated per stage. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a failed LLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom system instruction. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Directory artifacts are written to. Default: `./output`.
    pub output_dir: PathBuf,

    /// The pdfium shared library, or the directory containing it. If None,
    /// checks `PDFIUM_LIB_PATH`, then the system library search path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,

    /// Cancels the batch between documents and between stages.
    pub cancellation: Option<CancellationToken>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            model: None,
            provider_name: None,
            provider: None,
            extractor: None,
            completion_client: None,
            artifact_writer: None,
            temperature: 0.3,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            system_prompt: None,
            output_dir: PathBuf::from("output"),
            pdfium_lib_path: None,
            download_timeout_secs: 120,
            progress_callback: None,
            cancellation: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opaque = |set: bool| if set { Some("<dyn>") } else { None };
        f.debug_struct("PipelineConfig")
            .field("workers", &self.workers)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &opaque(self.provider.is_some()))
            .field("extractor", &opaque(self.extractor.is_some()))
            .field("completion_client", &opaque(self.completion_client.is_some()))
            .field("artifact_writer", &opaque(self.artifact_writer.is_some()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("output_dir", &self.output_dir)
            .field("cancellable", &self.cancellation.is_some())
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn max_prompt_chars(mut self, n: usize) -> Self {
        self.config.max_prompt_chars = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn completion_client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.config.completion_client = Some(client);
        self
    }

    pub fn artifact_writer(mut self, writer: Arc<dyn ArtifactWriter>) -> Self {
        self.config.artifact_writer = Some(writer);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = Some(token);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, DocStageError> {
        let c = &self.config;
        if c.workers == 0 {
            return Err(DocStageError::InvalidConfig("workers must be ≥ 1".into()));
        }
        if c.max_prompt_chars == 0 {
            return Err(DocStageError::InvalidConfig(
                "max_prompt_chars must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocStageError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.workers, 4);
        assert_eq!(c.max_prompt_chars, 15_000);
        assert_eq!(c.temperature, 0.3);
        assert!(!c.is_cancelled());
    }

    #[test]
    fn zero_workers_rejected() {
        let err = PipelineConfig::builder().workers(0).build().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn temperature_is_clamped() {
        let c = PipelineConfig::builder().temperature(7.5).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn cancellation_is_observed() {
        let token = CancellationToken::new();
        let c = PipelineConfig::builder()
            .cancellation(token.clone())
            .build()
            .unwrap();
        token.cancel();
        assert!(c.is_cancelled());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let s = format!("{:?}", PipelineConfig::default());
        assert!(s.contains("workers: 4"));
        assert!(s.contains("provider: None"));
    }
}
