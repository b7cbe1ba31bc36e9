//! Batch inputs and results.
//!
//! Results are plain data: every type here is `Clone + Serialize` so a
//! finished batch can be printed as JSON by the CLI or handed to a UI layer
//! unchanged.

use crate::error::{DocumentError, StageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One submitted document. Cheap to clone: the bytes are shared.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub content: Arc<[u8]>,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// The three transformations a document can go through, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Translate,
    Summarize,
    Analyze,
}

impl Stage {
    /// All stages in the fixed order they run for a document.
    pub const ORDER: [Stage; 3] = [Stage::Translate, Stage::Summarize, Stage::Analyze];

    /// Machine name, also used in artifact file names.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Translate => "translate",
            Stage::Summarize => "summarize",
            Stage::Analyze => "analyze",
        }
    }

    /// Human label used in artifact titles.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Translate => "Translation",
            Stage::Summarize => "Summary",
            Stage::Analyze => "Analysis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one attempted stage.
///
/// Exactly one of (`text` + `artifact_path`) or `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub text: Option<String>,
    pub artifact_path: Option<PathBuf>,
    pub error: Option<StageError>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
    pub duration_ms: u64,
}

impl StageOutcome {
    pub fn succeeded(stage: Stage, text: String, artifact_path: PathBuf) -> Self {
        Self {
            stage,
            text: Some(text),
            artifact_path: Some(artifact_path),
            error: None,
            input_tokens: 0,
            output_tokens: 0,
            retries: 0,
            duration_ms: 0,
        }
    }

    pub fn failed(stage: Stage, error: impl Into<StageError>) -> Self {
        Self {
            stage,
            text: None,
            artifact_path: None,
            error: Some(error.into()),
            input_tokens: 0,
            output_tokens: 0,
            retries: 0,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything that happened to one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    pub document_name: String,
    /// Attempted stages in execution order. Empty when `error` is set.
    pub outcomes: Vec<StageOutcome>,
    /// Document-level failure: extraction failed, the worker crashed, or the
    /// batch was cancelled before the document started.
    pub error: Option<DocumentError>,
    /// The batch was cancelled between stages; later stages were skipped.
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl DocumentResult {
    pub fn new(document_name: impl Into<String>) -> Self {
        Self {
            document_name: document_name.into(),
            outcomes: Vec::new(),
            error: None,
            cancelled: false,
            duration_ms: 0,
        }
    }

    /// A result with no outcomes and a document-level error.
    pub fn failed(document_name: impl Into<String>, error: impl Into<DocumentError>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(document_name)
        }
    }

    /// True when the document was processed and every attempted stage succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.cancelled && self.outcomes.iter().all(|o| o.is_success())
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.stage == stage)
    }

    /// Artifact paths of the successful stages.
    pub fn artifacts(&self) -> impl Iterator<Item = (Stage, &Path)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.artifact_path.as_deref().map(|p| (o.stage, p)))
    }
}

/// One result per submitted document, in completion order.
///
/// Keys (`document_name`) are unique; see
/// [`crate::pipeline::aggregate::unique_names`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchResult {
    documents: Vec<DocumentResult>,
}

impl BatchResult {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            documents: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, result: DocumentResult) {
        self.documents.push(result);
    }

    pub(crate) fn last(&self) -> Option<&DocumentResult> {
        self.documents.last()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, document_name: &str) -> Option<&DocumentResult> {
        self.documents
            .iter()
            .find(|d| d.document_name == document_name)
    }

    pub fn contains(&self, document_name: &str) -> bool {
        self.get(document_name).is_some()
    }

    /// Results in completion order.
    pub fn iter(&self) -> impl Iterator<Item = &DocumentResult> {
        self.documents.iter()
    }

    pub fn into_vec(self) -> Vec<DocumentResult> {
        self.documents
    }
}

impl<'a> IntoIterator for &'a BatchResult {
    type Item = &'a DocumentResult;
    type IntoIter = std::slice::Iter<'a, DocumentResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

/// Summary counters for a finished batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_documents: usize,
    /// Documents whose every attempted stage succeeded.
    pub succeeded_documents: usize,
    /// Documents with a document-level error (extraction, crash, cancelled).
    pub failed_documents: usize,
    pub succeeded_stages: usize,
    pub failed_stages: usize,
    pub artifacts: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

impl BatchStats {
    pub fn from_result(result: &BatchResult, total_duration_ms: u64) -> Self {
        let mut stats = BatchStats {
            total_documents: result.len(),
            total_duration_ms,
            ..Default::default()
        };
        for doc in result {
            if doc.error.is_some() {
                stats.failed_documents += 1;
            } else if doc.is_success() {
                stats.succeeded_documents += 1;
            }
            for outcome in &doc.outcomes {
                if outcome.is_success() {
                    stats.succeeded_stages += 1;
                } else {
                    stats.failed_stages += 1;
                }
                if outcome.artifact_path.is_some() {
                    stats.artifacts += 1;
                }
                stats.total_input_tokens += outcome.input_tokens as u64;
                stats.total_output_tokens += outcome.output_tokens as u64;
            }
        }
        stats
    }
}

/// A finished batch: per-document results plus counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub result: BatchResult,
    pub stats: BatchStats,
}
