//! Background batch API: progress as a `Stream`, result via `join`.
//!
//! Large batches take minutes. [`spawn_batch`] starts the batch on the tokio
//! runtime and returns immediately with a [`BatchHandle`], so a caller can
//! drive a progress bar from the event stream, cancel from a signal handler,
//! and collect the finished [`BatchOutput`] when it is ready.
//!
//! Unlike the eager [`crate::batch::run_batch`], nothing here blocks the
//! calling task until `join` is awaited.

use crate::batch::run_batch;
use crate::config::PipelineConfig;
use crate::error::DocStageError;
use crate::output::{BatchOutput, Document};
use crate::progress::{ChannelProgressCallback, FanOut, ProgressCallback, ProgressEvent};
use crate::request::ProcessingRequest;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

/// A boxed stream of batch progress events.
pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

/// A batch running in the background.
pub struct BatchHandle {
    progress: Option<ProgressStream>,
    cancel: CancellationToken,
    task: JoinHandle<Result<BatchOutput, DocStageError>>,
}

impl BatchHandle {
    /// Take the progress stream. Yields `1..=total` in order and ends when
    /// the batch finishes. Returns `None` on the second call.
    pub fn progress(&mut self) -> Option<ProgressStream> {
        self.progress.take()
    }

    /// Stop starting new documents and skip remaining stages of running
    /// ones. Already-issued calls finish; the batch still reports every
    /// document.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the batch to finish.
    pub async fn join(self) -> Result<BatchOutput, DocStageError> {
        self.task
            .await
            .map_err(|e| DocStageError::Internal(format!("batch task failed: {e}")))?
    }
}

/// Start a batch in the background.
///
/// Any `progress_callback` already in `config` keeps receiving events; the
/// returned handle's stream is fed alongside it. Must be called from within
/// a tokio runtime.
///
/// # Example
/// ```rust,no_run
/// use edgequake_docstage::{spawn_batch, Document, PipelineConfig, ProcessingRequest};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let docs = vec![Document::new("q3.pdf", std::fs::read("q3.pdf")?)];
/// let request = ProcessingRequest::builder().summarize(3).build()?;
///
/// let mut handle = spawn_batch(docs, request, &PipelineConfig::default());
/// if let Some(mut events) = handle.progress() {
///     while let Some(ev) = events.next().await {
///         eprintln!("{}/{}", ev.completed, ev.total);
///     }
/// }
/// let output = handle.join().await?;
/// println!("{} artifacts", output.stats.artifacts);
/// # Ok(())
/// # }
/// ```
pub fn spawn_batch(
    documents: Vec<Document>,
    request: ProcessingRequest,
    config: &PipelineConfig,
) -> BatchHandle {
    let (channel, rx) = ChannelProgressCallback::new();
    let mut callbacks: Vec<ProgressCallback> = Vec::with_capacity(2);
    if let Some(ref existing) = config.progress_callback {
        callbacks.push(Arc::clone(existing));
    }
    callbacks.push(Arc::new(channel));

    let cancel = config.cancellation.clone().unwrap_or_default();

    let mut config = config.clone();
    config.progress_callback = Some(Arc::new(FanOut(callbacks)));
    config.cancellation = Some(cancel.clone());

    // The config (and with it the channel sender) moves into the task, so
    // the stream ends when the batch does.
    let task = tokio::spawn(async move { run_batch(documents, &request, &config).await });

    BatchHandle {
        progress: Some(Box::pin(UnboundedReceiverStream::new(rx))),
        cancel,
        task,
    }
}
