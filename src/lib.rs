//! # edgequake-docstage
//!
//! Run batches of PDF documents through LLM-driven translation, summarisation
//! and structured analysis, one Markdown artifact per successful stage.
//!
//! ## Why this crate?
//!
//! Processing a folder of reports one at a time through a chat window wastes
//! hours, and a naive script either serialises everything or loses track of
//! which document failed where. This crate runs documents on a bounded worker
//! pool, isolates every failure to the smallest unit it affects (a stage, or
//! a document) and always reports one result per submitted document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! documents
//!  │
//!  ├─ 1. Schedule   W workers pull from one shared queue
//!  ├─ 2. Extract    PDF text via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Stages     translate → summarize → analyze, strictly in order
//!  │                 each: prompt → LLM (retry/backoff) → cleanup → artifact
//!  └─ 4. Aggregate  one DocumentResult per document + progress 1..=N
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docstage::{run_batch_from_inputs, AnalysisType, PipelineConfig, ProcessingRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let request = ProcessingRequest::builder()
//!         .summarize(3)
//!         .analyze(AnalysisType::CompanyFinancials)
//!         .build()?;
//!     let config = PipelineConfig::builder().workers(4).output_dir("reports").build()?;
//!
//!     let output = run_batch_from_inputs(&["q1.pdf", "q2.pdf"], &request, &config).await?;
//!     for doc in &output.result {
//!         for (stage, path) in doc.artifacts() {
//!             println!("{} {}: {}", doc.document_name, stage, path.display());
//!         }
//!     }
//!     eprintln!("{}/{} documents succeeded",
//!         output.stats.succeeded_documents,
//!         output.stats.total_documents);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure Isolation
//!
//! | Failure | Scope | Where it shows up |
//! |---------|-------|-------------------|
//! | Text extraction | document | `DocumentResult::error`, no outcomes |
//! | LLM call, empty answer | stage | `StageOutcome::error`, later stages still run |
//! | Artifact write | stage | `StageOutcome::error` |
//! | Worker panic | document | `DocumentError::Internal` |
//! | Invalid request, no provider, unreadable input | batch | `Err(DocStageError)` |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docstage` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-docstage = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod request;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, run_batch_from_inputs, run_batch_sync};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{
    CompletionError, DocStageError, DocumentError, ExtractionError, StageError, WriteError,
};
pub use output::{
    BatchOutput, BatchResult, BatchStats, Document, DocumentResult, Stage, StageOutcome,
};
pub use pipeline::artifact::{ArtifactWriter, MarkdownArtifactWriter};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::llm::{Completion, CompletionClient, LlmCompletionClient};
pub use progress::{
    BatchProgressCallback, ChannelProgressCallback, NoopProgressCallback, ProgressCallback,
    ProgressEvent,
};
pub use request::{AnalysisType, ProcessingRequest, ProcessingRequestBuilder};
pub use stream::{spawn_batch, BatchHandle, ProgressStream};
