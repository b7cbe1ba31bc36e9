//! Batch scheduler: a fixed pool of workers over a shared document queue.
//!
//! ```text
//!  documents ──► queue ──► worker 0 ─┐
//!                     ├──► worker 1 ─┼──► results ──► Aggregator ──► BatchResult
//!                     └──► worker W ─┘
//! ```
//!
//! Each worker takes one document at a time and runs it to completion, so at
//! most `W` documents are in flight. Every document's stage run is spawned as
//! its own task: a panic outside any stage (in extraction, say) surfaces as a
//! `JoinError` and becomes a [`DocumentError::Internal`] result, and the
//! worker moves on to the next document. Panics inside a stage are already
//! caught by the [`StageRunner`].

use crate::error::DocumentError;
use crate::output::{BatchResult, Document, DocumentResult};
use crate::pipeline::aggregate::Aggregator;
use crate::pipeline::stages::{panic_message, StageRunner};
use crate::progress::ProgressCallback;
use crate::request::ProcessingRequest;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Shared receiver for multiple workers pulling from one unbounded channel.
pub struct SharedReceiver<T> {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
}

impl<T> SharedReceiver<T> {
    pub fn new_unbounded(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

/// Runs a batch of documents through a [`StageRunner`] with bounded
/// concurrency.
pub struct BatchScheduler {
    runner: StageRunner,
    workers: usize,
    progress: Option<ProgressCallback>,
    cancellation: Option<CancellationToken>,
}

impl BatchScheduler {
    /// `workers` is clamped to at least 1.
    pub fn new(runner: StageRunner, workers: usize) -> Self {
        Self {
            runner,
            workers: workers.max(1),
            progress: None,
            cancellation: None,
        }
    }

    pub fn progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Process every document and return one result per document.
    ///
    /// Document names must already be unique
    /// (see [`crate::pipeline::aggregate::unique_names`]).
    pub async fn run(
        &self,
        documents: Vec<Document>,
        request: Arc<ProcessingRequest>,
    ) -> BatchResult {
        let total = documents.len();
        if total == 0 {
            return BatchResult::default();
        }
        let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();

        let (job_tx, job_rx) = mpsc::unbounded_channel();
        for doc in documents {
            // Receiver is alive until the workers below exit.
            let _ = job_tx.send(doc);
        }
        drop(job_tx);
        let jobs = SharedReceiver::new_unbounded(job_rx);

        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<DocumentResult>();
        let worker_count = self.workers.min(total);
        info!("Processing {} documents with {} workers", total, worker_count);

        let mut handles = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            handles.push(tokio::spawn(worker_loop(
                i,
                jobs.clone(),
                result_tx.clone(),
                self.runner.clone(),
                request.clone(),
                self.progress.clone(),
                self.cancellation.clone(),
            )));
        }
        drop(result_tx);

        let mut aggregator = Aggregator::new(total, self.progress.clone());
        while let Some(result) = result_rx.recv().await {
            aggregator.record(result);
        }

        for (i, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(worker = i, error = %e, "Worker task failed");
            }
        }

        // A worker that died between dequeuing and reporting leaves a hole;
        // every submitted document still gets exactly one result.
        for name in names {
            if !aggregator.is_recorded(&name) {
                error!(document = %name, "No result reported; recording internal failure");
                aggregator.record(DocumentResult::failed(
                    name,
                    DocumentError::Internal {
                        detail: "worker exited without reporting a result".into(),
                    },
                ));
            }
        }

        aggregator.finish()
    }
}

async fn worker_loop(
    id: usize,
    jobs: SharedReceiver<Document>,
    results: mpsc::UnboundedSender<DocumentResult>,
    runner: StageRunner,
    request: Arc<ProcessingRequest>,
    progress: Option<ProgressCallback>,
    cancellation: Option<CancellationToken>,
) {
    debug!(worker = id, "Document worker started");

    while let Some(doc) = jobs.recv().await {
        let name = doc.name.clone();

        let result = if cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
            debug!(worker = id, document = %name, "Cancelled before start");
            DocumentResult::failed(name, DocumentError::Cancelled)
        } else {
            if let Some(ref cb) = progress {
                cb.on_document_start(&name);
            }
            let runner = runner.clone();
            let request = request.clone();
            match tokio::spawn(async move { runner.run(&doc, &request).await }).await {
                Ok(result) => result,
                Err(e) => {
                    let detail = join_error_detail(e);
                    error!(worker = id, document = %name, "{}", detail);
                    DocumentResult::failed(name, DocumentError::Internal { detail })
                }
            }
        };

        if results.send(result).is_err() {
            break;
        }
    }

    debug!(worker = id, "Document worker finished");
}

fn join_error_detail(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("document task cancelled: {err}");
    }
    let payload = err.into_panic();
    format!("document task panicked: {}", panic_message(payload.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_receiver_hands_each_item_out_once() {
        let (tx, rx) = mpsc::unbounded_channel();
        for i in 0..10 {
            tx.send(i).unwrap();
        }
        drop(tx);

        let shared = SharedReceiver::new_unbounded(rx);
        let a = shared.clone();
        let b = shared.clone();
        let ta = tokio::spawn(async move {
            let mut got = Vec::new();
            while let Some(i) = a.recv().await {
                got.push(i);
            }
            got
        });
        let tb = tokio::spawn(async move {
            let mut got = Vec::new();
            while let Some(i) = b.recv().await {
                got.push(i);
            }
            got
        });

        let mut all = ta.await.unwrap();
        all.extend(tb.await.unwrap());
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn panic_message_is_captured() {
        let err = tokio::spawn(async { panic!("pdf engine exploded") })
            .await
            .unwrap_err();
        assert_eq!(
            join_error_detail(err),
            "document task panicked: pdf engine exploded"
        );

        let err = tokio::spawn(async { panic!("page {}", 7) }).await.unwrap_err();
        assert_eq!(join_error_detail(err), "document task panicked: page 7");
    }
}
