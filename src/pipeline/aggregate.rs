//! Result collection: one entry per document, progress reported on insert.
//!
//! The [`Aggregator`] is owned by a single collecting task, so the
//! "push result, then bump the counter, then notify" sequence needs no lock
//! and callbacks always observe `completed` values 1, 2, …, N in order.

use crate::output::{BatchResult, Document, DocumentResult};
use crate::progress::{ProgressCallback, ProgressEvent};
use std::collections::HashSet;
use tracing::warn;

/// Collects [`DocumentResult`]s and reports progress.
pub struct Aggregator {
    total: usize,
    completed: usize,
    seen: HashSet<String>,
    result: BatchResult,
    progress: Option<ProgressCallback>,
}

impl Aggregator {
    pub fn new(total: usize, progress: Option<ProgressCallback>) -> Self {
        Self {
            total,
            completed: 0,
            seen: HashSet::with_capacity(total),
            result: BatchResult::with_capacity(total),
            progress,
        }
    }

    /// Record a finished document.
    ///
    /// The result is stored before the progress event is emitted, so a
    /// callback reading `completed` never sees a count ahead of the results.
    /// A second result under an already-recorded name is dropped and yields
    /// `None`.
    pub fn record(&mut self, result: DocumentResult) -> Option<ProgressEvent> {
        if !self.seen.insert(result.document_name.clone()) {
            warn!(document = %result.document_name, "Duplicate result ignored");
            return None;
        }

        self.result.push(result);
        self.completed += 1;

        let event = ProgressEvent {
            completed: self.completed,
            total: self.total,
        };
        if let (Some(cb), Some(doc)) = (&self.progress, self.result.last()) {
            cb.on_document_complete(event, doc);
        }
        Some(event)
    }

    pub fn is_recorded(&self, document_name: &str) -> bool {
        self.seen.contains(document_name)
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn finish(self) -> BatchResult {
        self.result
    }
}

/// Make document names unique within a batch.
///
/// Later duplicates get a ` (2)`, ` (3)`, … suffix so every document keeps its
/// own result entry and artifact files.
pub fn unique_names(documents: Vec<Document>) -> Vec<Document> {
    let mut taken: HashSet<String> = HashSet::with_capacity(documents.len());
    documents
        .into_iter()
        .map(|mut doc| {
            if !taken.insert(doc.name.clone()) {
                let mut n = 2;
                let renamed = loop {
                    let candidate = format!("{} ({})", doc.name, n);
                    if !taken.contains(&candidate) {
                        break candidate;
                    }
                    n += 1;
                };
                warn!(original = %doc.name, renamed = %renamed, "Duplicate document name");
                taken.insert(renamed.clone());
                doc.name = renamed;
            }
            doc
        })
        .collect()
}
