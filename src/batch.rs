//! Batch entry points.
//!
//! [`run_batch`] waits for every document and returns the finished
//! [`BatchOutput`]. Use [`crate::stream::spawn_batch`] instead to observe
//! progress as a `Stream` or to cancel a running batch from another task.

use crate::config::PipelineConfig;
use crate::error::{DocStageError, DocumentError};
use crate::output::{BatchOutput, BatchResult, BatchStats, Document, DocumentResult};
use crate::pipeline::aggregate::{unique_names, Aggregator};
use crate::pipeline::artifact::{ArtifactWriter, MarkdownArtifactWriter};
use crate::pipeline::extract::{PdfiumExtractor, TextExtractor};
use crate::pipeline::input;
use crate::pipeline::llm::{CompletionClient, LlmCompletionClient};
use crate::pipeline::scheduler::BatchScheduler;
use crate::pipeline::stages::StageRunner;
use crate::request::ProcessingRequest;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Model used when a provider is chosen without naming a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Run every enabled stage of `request` over `documents`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(BatchOutput)` with exactly one [`crate::DocumentResult`] per submitted
/// document, however many extractions or stages failed. Duplicate document
/// names are made unique first (`name`, `name (2)`, …).
///
/// # Errors
/// Returns `Err(DocStageError)` only when the batch cannot start:
/// - the request enables no stage or is otherwise invalid
/// - no LLM provider can be resolved
pub async fn run_batch(
    documents: Vec<Document>,
    request: &ProcessingRequest,
    config: &PipelineConfig,
) -> Result<BatchOutput, DocStageError> {
    let start = Instant::now();
    request.validate()?;
    if config.workers == 0 {
        return Err(DocStageError::InvalidConfig("workers must be ≥ 1".into()));
    }

    let documents = unique_names(documents);
    let total = documents.len();
    info!(
        "Starting batch: {} documents, {} stages each, {} workers",
        total,
        request.enabled_stages(),
        config.workers
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let result = if total == 0 {
        BatchResult::default()
    } else if config.is_cancelled() {
        info!("Batch cancelled before start; skipping provider setup");
        cancelled_before_start(documents, config)
    } else {
        let mut scheduler = BatchScheduler::new(build_runner(config)?, config.workers);
        if let Some(ref cb) = config.progress_callback {
            scheduler = scheduler.progress(Arc::clone(cb));
        }
        if let Some(ref token) = config.cancellation {
            scheduler = scheduler.cancellation(token.clone());
        }
        scheduler.run(documents, Arc::new(request.clone())).await
    };

    let stats = BatchStats::from_result(&result, start.elapsed().as_millis() as u64);
    info!(
        "Batch complete: {}/{} documents succeeded, {} artifacts, {}ms total",
        stats.succeeded_documents, stats.total_documents, stats.artifacts, stats.total_duration_ms
    );
    debug!(
        "Tokens: {} in / {} out",
        stats.total_input_tokens, stats.total_output_tokens
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(&stats);
    }

    Ok(BatchOutput { result, stats })
}

/// Every document gets a `Cancelled` result and a progress event.
fn cancelled_before_start(documents: Vec<Document>, config: &PipelineConfig) -> BatchResult {
    let mut aggregator = Aggregator::new(documents.len(), config.progress_callback.clone());
    for doc in documents {
        aggregator.record(DocumentResult::failed(doc.name, DocumentError::Cancelled));
    }
    aggregator.finish()
}

/// Load local paths, directories of PDFs, or URLs, then [`run_batch`] them.
///
/// Unlike per-document failures, an input that cannot be read or downloaded
/// is fatal: nothing is processed.
pub async fn run_batch_from_inputs<S: AsRef<str>>(
    inputs: &[S],
    request: &ProcessingRequest,
    config: &PipelineConfig,
) -> Result<BatchOutput, DocStageError> {
    request.validate()?;
    let inputs = input::expand_inputs(inputs);
    let documents = input::load_documents(&inputs, config.download_timeout_secs).await?;
    run_batch(documents, request, config).await
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(
    documents: Vec<Document>,
    request: &ProcessingRequest,
    config: &PipelineConfig,
) -> Result<BatchOutput, DocStageError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocStageError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(documents, request, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Assemble the stage runner from config overrides or the built-in
/// collaborators.
fn build_runner(config: &PipelineConfig) -> Result<StageRunner, DocStageError> {
    let extractor: Arc<dyn TextExtractor> = match config.extractor {
        Some(ref e) => Arc::clone(e),
        None => Arc::new(PdfiumExtractor::new(config.pdfium_lib_path.clone())),
    };

    let client: Arc<dyn CompletionClient> = match config.completion_client {
        Some(ref c) => Arc::clone(c),
        None => Arc::new(LlmCompletionClient::new(resolve_provider(config)?, config)),
    };

    let writer: Arc<dyn ArtifactWriter> = match config.artifact_writer {
        Some(ref w) => Arc::clone(w),
        None => Arc::new(MarkdownArtifactWriter::new(&config.output_dir)),
    };

    let mut runner = StageRunner::new(extractor, client, writer)
        .max_prompt_chars(config.max_prompt_chars);
    if let Some(ref prompt) = config.system_prompt {
        runner = runner.system_prompt(prompt);
    }
    if let Some(ref cb) = config.progress_callback {
        runner = runner.progress(Arc::clone(cb));
    }
    if let Some(ref token) = config.cancellation {
        runner = runner.cancellation(token.clone());
    }
    Ok(runner)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DocStageError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocStageError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
///
/// 2. **Named provider + model** (`config.provider_name`) — built with
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key (`OPENAI_API_KEY`, etc.) from the environment.
///
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`) —
///    checked before auto-detection so the model choice is honoured even
///    when multiple API keys are present.
///
/// 4. **OpenAI key** (`OPENAI_API_KEY`) — preferred when several keys exist.
///
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// An explicit `config.completion_client` bypasses all of this.
fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, DocStageError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocStageError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
