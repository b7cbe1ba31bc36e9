//! Stage runner: one document through translate → summarize → analyze.
//!
//! The runner never fails. Extraction errors become the document's `error`
//! and stop it; completion and write errors become that stage's outcome and
//! the next stage runs anyway. A panic inside a stage is caught at the stage
//! boundary and recorded the same way, so outcomes already produced for the
//! document are kept.

use crate::error::{CompletionError, StageError};
use crate::output::{Document, DocumentResult, Stage, StageOutcome};
use crate::pipeline::artifact::ArtifactWriter;
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::llm::CompletionClient;
use crate::pipeline::postprocess::clean_generated_text;
use crate::progress::ProgressCallback;
use crate::prompts::{self, DEFAULT_SYSTEM_PROMPT};
use crate::request::ProcessingRequest;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Stages enabled by `request`, in execution order.
pub fn enabled_stages(request: &ProcessingRequest) -> impl Iterator<Item = Stage> + '_ {
    Stage::ORDER.into_iter().filter(move |stage| match stage {
        Stage::Translate => request.translate,
        Stage::Summarize => request.summarize,
        Stage::Analyze => request.analyze,
    })
}

/// Build the user prompt for one stage from already-truncated text.
pub fn build_prompt(
    stage: Stage,
    text: &str,
    document_name: &str,
    request: &ProcessingRequest,
) -> String {
    match stage {
        Stage::Translate => prompts::translate_prompt(text, &request.target_language),
        Stage::Summarize => prompts::summary_prompt(text, request.detail_level),
        Stage::Analyze => prompts::analysis_prompt(
            text,
            document_name,
            request.analysis_type,
            request.include_risk,
            request.include_suggestion,
        ),
    }
}

/// Text of a panic payload, for the common `&str` and `String` cases.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic payload"
    }
}

/// Runs the enabled stages for one document against the three collaborators.
///
/// Cheap to clone; every worker holds its own copy.
#[derive(Clone)]
pub struct StageRunner {
    extractor: Arc<dyn TextExtractor>,
    client: Arc<dyn CompletionClient>,
    writer: Arc<dyn ArtifactWriter>,
    system_prompt: Arc<str>,
    max_prompt_chars: usize,
    progress: Option<ProgressCallback>,
    cancellation: Option<CancellationToken>,
}

impl StageRunner {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        client: Arc<dyn CompletionClient>,
        writer: Arc<dyn ArtifactWriter>,
    ) -> Self {
        Self {
            extractor,
            client,
            writer,
            system_prompt: Arc::from(DEFAULT_SYSTEM_PROMPT),
            max_prompt_chars: crate::config::DEFAULT_MAX_PROMPT_CHARS,
            progress: None,
            cancellation: None,
        }
    }

    pub fn system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = Arc::from(prompt);
        self
    }

    pub fn max_prompt_chars(mut self, n: usize) -> Self {
        self.max_prompt_chars = n;
        self
    }

    pub fn progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Extract `document` and run every enabled stage, strictly in order.
    pub async fn run(&self, document: &Document, request: &ProcessingRequest) -> DocumentResult {
        let start = Instant::now();
        let mut result = DocumentResult::new(&document.name);

        let text = match self.extractor.extract(&document.content).await {
            Ok(text) => text,
            Err(e) => {
                warn!(document = %document.name, error = %e, "Extraction failed");
                result.error = Some(e.into());
                result.duration_ms = start.elapsed().as_millis() as u64;
                return result;
            }
        };
        let text = prompts::truncate_chars(&text, self.max_prompt_chars);
        debug!(document = %document.name, chars = text.chars().count(), "Extracted text");

        for stage in enabled_stages(request) {
            if self.is_cancelled() {
                debug!(document = %document.name, %stage, "Cancelled before stage");
                result.cancelled = true;
                break;
            }

            let stage_start = Instant::now();
            let attempt = self.run_stage(stage, &document.name, text, request);
            let outcome = match AssertUnwindSafe(attempt).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let detail = panic_message(payload.as_ref()).to_string();
                    warn!(document = %document.name, %stage, %detail, "Stage panicked");
                    let mut outcome = StageOutcome::failed(stage, StageError::Internal { detail });
                    outcome.duration_ms = stage_start.elapsed().as_millis() as u64;
                    outcome
                }
            };
            if let Some(ref cb) = self.progress {
                cb.on_stage_complete(&document.name, &outcome);
            }
            result.outcomes.push(outcome);
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    async fn run_stage(
        &self,
        stage: Stage,
        document_name: &str,
        text: &str,
        request: &ProcessingRequest,
    ) -> StageOutcome {
        let start = Instant::now();
        let prompt = build_prompt(stage, text, document_name, request);

        let completion = match self.client.complete(&self.system_prompt, &prompt).await {
            Ok(c) => c,
            Err(e) => {
                warn!(document = %document_name, %stage, error = %e, "Stage failed");
                let mut outcome = StageOutcome::failed(stage, e);
                outcome.duration_ms = start.elapsed().as_millis() as u64;
                return outcome;
            }
        };

        let body = clean_generated_text(&completion.text);
        let written: Result<_, StageError> = if body.is_empty() {
            Err(CompletionError::EmptyResponse.into())
        } else {
            self.writer
                .write_artifact(document_name, stage, &body)
                .await
                .map_err(Into::into)
        };

        let mut outcome = match written {
            Ok(path) => StageOutcome::succeeded(stage, body, path),
            Err(e) => {
                warn!(document = %document_name, %stage, error = %e, "Stage failed");
                StageOutcome::failed(stage, e)
            }
        };
        outcome.input_tokens = completion.input_tokens;
        outcome.output_tokens = completion.output_tokens;
        outcome.retries = completion.retries;
        outcome.duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            document = %document_name,
            %stage,
            ok = outcome.is_success(),
            ms = outcome.duration_ms,
            "Stage finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionError, WriteError};
    use crate::pipeline::llm::Completion;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FixedText(Result<String, ExtractionError>);

    #[async_trait]
    impl TextExtractor for FixedText {
        async fn extract(&self, _content: &[u8]) -> Result<String, ExtractionError> {
            self.0.clone()
        }
    }

    /// Records prompts; answers with the given text.
    struct Echo {
        answer: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionClient for Echo {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<Completion, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(Completion::new(self.answer.clone()))
        }
    }

    /// Panics on the analysis prompt, answers everything else.
    struct PanicsOnAnalysis;

    #[async_trait]
    impl CompletionClient for PanicsOnAnalysis {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<Completion, CompletionError> {
            if prompt.starts_with("As a ") {
                panic!("provider sdk bug");
            }
            Ok(Completion::new("generated"))
        }
    }

    struct FailingWriter;

    #[async_trait]
    impl ArtifactWriter for FailingWriter {
        async fn write_artifact(&self, _: &str, _: Stage, _: &str) -> Result<PathBuf, WriteError> {
            Err(WriteError::Io {
                path: PathBuf::from("/ro/x.md"),
                detail: "read-only file system".into(),
            })
        }
    }

    struct MemWriter;

    #[async_trait]
    impl ArtifactWriter for MemWriter {
        async fn write_artifact(&self, doc: &str, stage: Stage, _: &str) -> Result<PathBuf, WriteError> {
            Ok(PathBuf::from(format!("{doc}_{stage}.md")))
        }
    }

    fn doc() -> Document {
        Document::new("report.pdf", b"%PDF-1.4".to_vec())
    }

    #[test]
    fn enabled_stages_keep_fixed_order() {
        let r = ProcessingRequest {
            analyze: true,
            translate: true,
            ..Default::default()
        };
        assert_eq!(
            enabled_stages(&r).collect::<Vec<_>>(),
            vec![Stage::Translate, Stage::Analyze]
        );
    }

    #[tokio::test]
    async fn prompt_text_is_truncated() {
        let client = Arc::new(Echo {
            answer: "ok".into(),
            prompts: Mutex::new(Vec::new()),
        });
        let runner = StageRunner::new(
            Arc::new(FixedText(Ok("abcdefghij".into()))),
            client.clone(),
            Arc::new(MemWriter),
        )
        .max_prompt_chars(4);
        let request = ProcessingRequest::builder().translate("English").build().unwrap();

        let result = runner.run(&doc(), &request).await;

        assert!(result.is_success());
        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].ends_with("abcd"), "got: {}", prompts[0]);
        assert!(!prompts[0].contains("abcde"));
    }

    #[tokio::test]
    async fn write_failure_is_stage_local() {
        let runner = StageRunner::new(
            Arc::new(FixedText(Ok("text".into()))),
            Arc::new(Echo {
                answer: "generated".into(),
                prompts: Mutex::new(Vec::new()),
            }),
            Arc::new(FailingWriter),
        );
        let request = ProcessingRequest::builder()
            .translate("English")
            .summarize(3)
            .build()
            .unwrap();

        let result = runner.run(&doc(), &request).await;

        assert!(result.error.is_none());
        assert_eq!(result.outcomes.len(), 2);
        for outcome in &result.outcomes {
            assert!(matches!(outcome.error, Some(StageError::Write(_))));
            assert!(outcome.text.is_none() && outcome.artifact_path.is_none());
        }
    }

    #[tokio::test]
    async fn blank_answer_after_cleanup_is_empty_response() {
        let runner = StageRunner::new(
            Arc::new(FixedText(Ok("text".into()))),
            Arc::new(Echo {
                answer: "```markdown\n\n```".into(),
                prompts: Mutex::new(Vec::new()),
            }),
            Arc::new(MemWriter),
        );
        let request = ProcessingRequest::builder().summarize(1).build().unwrap();

        let result = runner.run(&doc(), &request).await;
        assert_eq!(
            result.outcomes[0].error,
            Some(StageError::Completion(CompletionError::EmptyResponse))
        );
    }

    #[tokio::test]
    async fn cancelled_token_skips_remaining_stages() {
        let token = CancellationToken::new();
        token.cancel();
        let runner = StageRunner::new(
            Arc::new(FixedText(Ok("text".into()))),
            Arc::new(Echo {
                answer: "x".into(),
                prompts: Mutex::new(Vec::new()),
            }),
            Arc::new(MemWriter),
        )
        .cancellation(token);
        let request = ProcessingRequest::builder().summarize(2).build().unwrap();

        let result = runner.run(&doc(), &request).await;
        assert!(result.cancelled);
        assert!(result.outcomes.is_empty());
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn stage_panic_keeps_earlier_outcomes() {
        let runner = StageRunner::new(
            Arc::new(FixedText(Ok("text".into()))),
            Arc::new(PanicsOnAnalysis),
            Arc::new(MemWriter),
        );
        let request = ProcessingRequest::builder()
            .translate("English")
            .summarize(3)
            .analyze(crate::request::AnalysisType::IndustryReport)
            .build()
            .unwrap();

        let result = runner.run(&doc(), &request).await;

        assert!(result.error.is_none());
        assert_eq!(result.outcomes.len(), 3);
        assert!(result.outcomes[0].is_success());
        assert!(result.outcomes[1].is_success());
        assert_eq!(
            result.outcomes[2].error,
            Some(StageError::Internal {
                detail: "provider sdk bug".into()
            })
        );
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(format!("page {}", 3));
        assert_eq!(panic_message(boxed.as_ref()), "page 3");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
