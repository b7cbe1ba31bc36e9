//! Progress reporting for batch runs.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as documents move through the pipeline.
//!
//! The one event with hard guarantees is [`ProgressEvent`], delivered through
//! [`BatchProgressCallback::on_document_complete`]: exactly once per
//! document, `completed` strictly increasing `1, 2, …, total`, and always
//! after the document's result has been folded into the batch result.
//! The other hooks are informational.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docstage::{BatchProgressCallback, DocumentResult, PipelineConfig, ProgressEvent};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl BatchProgressCallback for Printer {
//!     fn on_document_complete(&self, event: ProgressEvent, result: &DocumentResult) {
//!         eprintln!("{}/{} {}", event.completed, event.total, result.document_name);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{BatchStats, DocumentResult, StageOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Batch-level progress: `completed` of `total` documents are done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
}

impl ProgressEvent {
    pub fn is_final(&self) -> bool {
        self.completed == self.total
    }

    /// Completed fraction in `0.0..=1.0`; an empty batch counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Called by the pipeline as the batch progresses.
///
/// Implementations must be `Send + Sync`: `on_document_start` and
/// `on_stage_complete` are called from worker tasks concurrently.
/// `on_batch_start`, `on_document_complete` and `on_batch_complete` are
/// called from the single collecting task, in order.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any document is scheduled.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called by a worker when it picks up a document.
    fn on_document_start(&self, document_name: &str) {
        let _ = document_name;
    }

    /// Called by a worker after each attempted stage.
    fn on_stage_complete(&self, document_name: &str, outcome: &StageOutcome) {
        let _ = (document_name, outcome);
    }

    /// Called once per document, after its result is recorded.
    fn on_document_complete(&self, event: ProgressEvent, result: &DocumentResult) {
        let _ = (event, result);
    }

    /// Called once after every document has completed.
    fn on_batch_complete(&self, stats: &BatchStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

/// Forwards every [`ProgressEvent`] into an unbounded channel.
///
/// Backs [`crate::stream::spawn_batch`]; usable on its own when a caller
/// prefers polling a receiver over implementing the trait.
pub struct ChannelProgressCallback {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressCallback {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl BatchProgressCallback for ChannelProgressCallback {
    fn on_document_complete(&self, event: ProgressEvent, _result: &DocumentResult) {
        // Receiver dropped means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

/// Fans events out to several callbacks in registration order.
pub(crate) struct FanOut(pub Vec<ProgressCallback>);

impl BatchProgressCallback for FanOut {
    fn on_batch_start(&self, total_documents: usize) {
        self.0.iter().for_each(|cb| cb.on_batch_start(total_documents));
    }

    fn on_document_start(&self, document_name: &str) {
        self.0.iter().for_each(|cb| cb.on_document_start(document_name));
    }

    fn on_stage_complete(&self, document_name: &str, outcome: &StageOutcome) {
        self.0
            .iter()
            .for_each(|cb| cb.on_stage_complete(document_name, outcome));
    }

    fn on_document_complete(&self, event: ProgressEvent, result: &DocumentResult) {
        self.0
            .iter()
            .for_each(|cb| cb.on_document_complete(event, result));
    }

    fn on_batch_complete(&self, stats: &BatchStats) {
        self.0.iter().for_each(|cb| cb.on_batch_complete(stats));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        completes: AtomicUsize,
        last_completed: AtomicUsize,
    }

    impl BatchProgressCallback for Counting {
        fn on_document_complete(&self, event: ProgressEvent, _result: &DocumentResult) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.last_completed.store(event.completed, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start("a.pdf");
        cb.on_document_complete(
            ProgressEvent { completed: 1, total: 2 },
            &DocumentResult::new("a.pdf"),
        );
        cb.on_batch_complete(&BatchStats::default());
    }

    #[test]
    fn fan_out_reaches_every_callback() {
        let a = Arc::new(Counting {
            completes: AtomicUsize::new(0),
            last_completed: AtomicUsize::new(0),
        });
        let b = Arc::new(Counting {
            completes: AtomicUsize::new(0),
            last_completed: AtomicUsize::new(0),
        });
        let fan = FanOut(vec![a.clone() as ProgressCallback, b.clone() as ProgressCallback]);
        fan.on_document_complete(
            ProgressEvent { completed: 1, total: 1 },
            &DocumentResult::new("x.pdf"),
        );
        assert_eq!(a.completes.load(Ordering::SeqCst), 1);
        assert_eq!(b.last_completed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn channel_callback_forwards_events() {
        let (cb, mut rx) = ChannelProgressCallback::new();
        cb.on_document_complete(
            ProgressEvent { completed: 1, total: 3 },
            &DocumentResult::new("x.pdf"),
        );
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev, ProgressEvent { completed: 1, total: 3 });
        assert!(!ev.is_final());
    }

    #[test]
    fn fraction_of_empty_batch_is_complete() {
        let ev = ProgressEvent { completed: 0, total: 0 };
        assert!(ev.is_final());
        assert_eq!(ev.fraction(), 1.0);
    }
}
