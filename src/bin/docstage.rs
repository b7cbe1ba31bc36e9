//! CLI binary for edgequake-docstage.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `ProcessingRequest` and a `PipelineConfig`, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docstage::{
    run_batch_from_inputs, AnalysisType, BatchOutput, BatchProgressCallback, BatchStats,
    DocumentResult, PipelineConfig, ProcessingRequest, ProgressCallback, ProgressEvent,
    StageOutcome,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

/// Keep log lines on one terminal row.
fn shorten(msg: &str, max_chars: usize) -> String {
    let first_line = msg.lines().next().unwrap_or_default();
    if first_line.chars().count() > max_chars {
        let cut: String = first_line.chars().take(max_chars - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        first_line.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: a live bar advanced once per finished document
/// plus one log line per stage. Stage lines from different workers interleave;
/// each names its document.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading documents…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_documents as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Processing");
        self.bar.set_message("");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, document_name: &str) {
        self.bar.set_message(document_name.to_string());
    }

    fn on_stage_complete(&self, document_name: &str, outcome: &StageOutcome) {
        let elapsed = dim(&format!("{:.1}s", outcome.duration_ms as f64 / 1000.0));
        match (&outcome.error, &outcome.artifact_path) {
            (None, Some(path)) => self.bar.println(format!(
                "  {} {:<10} {}  {}  {}",
                green("✓"),
                outcome.stage.name(),
                document_name,
                dim(&path.display().to_string()),
                elapsed,
            )),
            (Some(err), _) => self.bar.println(format!(
                "  {} {:<10} {}  {}  {}",
                red("✗"),
                outcome.stage.name(),
                document_name,
                red(&shorten(&err.to_string(), 80)),
                elapsed,
            )),
            (None, None) => {}
        }
    }

    fn on_document_complete(&self, event: ProgressEvent, result: &DocumentResult) {
        if let Some(ref err) = result.error {
            self.bar.println(format!(
                "  {} {:<10} {}  {}",
                red("✗"),
                "document",
                result.document_name,
                red(&shorten(&err.to_string(), 80)),
            ));
        } else if result.cancelled {
            self.bar.println(format!(
                "  {} {:<10} {}  {}",
                yellow("⚠"),
                "cancelled",
                result.document_name,
                dim("remaining stages skipped"),
            ));
        }
        self.bar.set_position(event.completed as u64);
    }

    fn on_batch_complete(&self, stats: &BatchStats) {
        self.bar.finish_and_clear();
        let failed = stats.total_documents - stats.succeeded_documents;
        if failed == 0 {
            eprintln!(
                "{} {} documents processed successfully",
                green("✔"),
                bold(&stats.total_documents.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents fully processed  ({} with failures)",
                if stats.succeeded_documents == 0 {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&stats.succeeded_documents.to_string()),
                stats.total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarise every PDF in a folder
  docstage --summarize reports/

  # Translate and analyse, 8 documents at a time
  docstage --translate --language German --analyze -w 8 q1.pdf q2.pdf

  # Company-financials analysis without the recommendation section
  docstage --analyze --analysis-type company-financials --no-suggestion annual.pdf

  # Process a document from a URL
  docstage --summarize --detail-level 5 https://example.com/report.pdf

  # Load the request from a JSON file, print the batch result as JSON
  docstage --request request.json --json *.pdf > result.json

REQUEST FILE (camelCase, every field optional):
  {
    "translate": true, "targetLanguage": "English",
    "summarize": true, "detailLevel": 3,
    "analyze": true, "analysisType": "industry-report",
    "includeRisk": true, "includeSuggestion": true
  }

OUTPUT:
  One Markdown file per successful (document, stage) in --output-dir:
    <document>_translate.md  <document>_summarize.md  <document>_analyze.md

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  DOCSTAGE_*              Every flag, e.g. DOCSTAGE_WORKERS=8

Press Ctrl-C once to stop starting new work; every document is still
reported.
"#;

/// Translate, summarise and analyse batches of PDF documents with LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "docstage",
    version,
    about = "Translate, summarise and analyse batches of PDF documents with LLMs",
    long_about = "Run a batch of PDF documents (local files, directories or URLs) through \
LLM-driven translation, summarisation and structured analysis. Documents are processed \
concurrently; every stage writes its own Markdown artifact and fails independently.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file paths, directories of PDFs, or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    // ── Request ──────────────────────────────────────────────────────────
    /// Translate each document.
    #[arg(long, env = "DOCSTAGE_TRANSLATE")]
    translate: bool,

    /// Translation target language.
    #[arg(long, env = "DOCSTAGE_LANGUAGE")]
    language: Option<String>,

    /// Produce a structured summary of each document.
    #[arg(long, env = "DOCSTAGE_SUMMARIZE")]
    summarize: bool,

    /// Summary detail level (1–5).
    #[arg(long, env = "DOCSTAGE_DETAIL_LEVEL",
          value_parser = clap::value_parser!(u8).range(1..=5))]
    detail_level: Option<u8>,

    /// Produce a structured analysis of each document.
    #[arg(long, env = "DOCSTAGE_ANALYZE")]
    analyze: bool,

    /// Kind of report the analysis reads the document as.
    #[arg(long, env = "DOCSTAGE_ANALYSIS_TYPE", value_enum)]
    analysis_type: Option<AnalysisTypeArg>,

    /// Omit the risk-assessment section from the analysis.
    #[arg(long, env = "DOCSTAGE_NO_RISK")]
    no_risk: bool,

    /// Omit the investment-recommendation section from the analysis.
    #[arg(long, env = "DOCSTAGE_NO_SUGGESTION")]
    no_suggestion: bool,

    /// JSON file with a processing request. Stage flags add to it.
    #[arg(long, env = "DOCSTAGE_REQUEST")]
    request: Option<PathBuf>,

    // ── Pipeline ─────────────────────────────────────────────────────────
    /// Documents processed concurrently.
    #[arg(short, long, env = "DOCSTAGE_WORKERS", default_value_t = 4,
          value_parser = clap::value_parser!(u64).range(1..))]
    workers: u64,

    /// Directory artifacts are written to.
    #[arg(short, long, env = "DOCSTAGE_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "DOCSTAGE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "DOCSTAGE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Characters of document text embedded into each prompt.
    #[arg(long, env = "DOCSTAGE_MAX_PROMPT_CHARS", default_value_t = 15_000)]
    max_prompt_chars: usize,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "DOCSTAGE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per stage.
    #[arg(long, env = "DOCSTAGE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCSTAGE_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Retries per stage on LLM failure.
    #[arg(long, env = "DOCSTAGE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "DOCSTAGE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCSTAGE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Path to libpdfium, or the directory containing it.
    #[arg(long, env = "DOCSTAGE_PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    // ── Output ───────────────────────────────────────────────────────────
    /// Print the batch result as JSON on stdout.
    #[arg(long, env = "DOCSTAGE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCSTAGE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCSTAGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCSTAGE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum AnalysisTypeArg {
    IndustryReport,
    CompanyFinancials,
    MarketAnalysis,
}

impl From<AnalysisTypeArg> for AnalysisType {
    fn from(v: AnalysisTypeArg) -> Self {
        match v {
            AnalysisTypeArg::IndustryReport => AnalysisType::IndustryReport,
            AnalysisTypeArg::CompanyFinancials => AnalysisType::CompanyFinancials,
            AnalysisTypeArg::MarketAnalysis => AnalysisType::MarketAnalysis,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build request + config ───────────────────────────────────────────
    let request = build_request(&cli).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let cancel = CancellationToken::new();
    let config = build_config(&cli, progress_cb, cancel.clone()).await?;

    // ── Ctrl-C → cancel ──────────────────────────────────────────────────
    {
        let cancel = cancel.clone();
        let quiet = cli.quiet;
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                if !quiet {
                    eprintln!(
                        "{} {}",
                        yellow("⚠"),
                        "Cancelling: no new documents or stages will start…"
                    );
                }
                cancel.cancel();
            }
        });
    }

    // ── Run batch ────────────────────────────────────────────────────────
    let output = run_batch_from_inputs(&cli.inputs, &request, &config)
        .await
        .context("Batch failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_report(&output, show_progress);
    }

    Ok(())
}

/// Merge the optional request file with the stage flags.
async fn build_request(cli: &Cli) -> Result<ProcessingRequest> {
    let mut request = match cli.request {
        Some(ref path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read request from {:?}", path))?;
            serde_json::from_str::<ProcessingRequest>(&raw)
                .with_context(|| format!("Invalid request file {:?}", path))?
        }
        None => ProcessingRequest::default(),
    };

    request.translate |= cli.translate;
    request.summarize |= cli.summarize;
    request.analyze |= cli.analyze;
    if let Some(ref language) = cli.language {
        request.target_language = language.clone();
    }
    if let Some(level) = cli.detail_level {
        request.detail_level = level;
    }
    if let Some(kind) = cli.analysis_type {
        request.analysis_type = kind.into();
    }
    if cli.no_risk {
        request.include_risk = false;
    }
    if cli.no_suggestion {
        request.include_suggestion = false;
    }

    request
        .validate()
        .context("Nothing to do: pass --translate, --summarize and/or --analyze")?;
    Ok(request)
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .workers(cli.workers as usize)
        .output_dir(&cli.output_dir)
        .max_prompt_chars(cli.max_prompt_chars)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .cancellation(cancel);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Human-readable result listing on stdout; totals on stderr.
fn print_report(output: &BatchOutput, progress_shown: bool) {
    for doc in &output.result {
        println!("{}", bold(&doc.document_name));
        if let Some(ref err) = doc.error {
            println!("  {} {}", red("✗"), err);
            continue;
        }
        for outcome in &doc.outcomes {
            match (&outcome.error, &outcome.artifact_path) {
                (None, Some(path)) => println!(
                    "  {} {:<10} {}",
                    green("✓"),
                    outcome.stage.name(),
                    path.display()
                ),
                (Some(err), _) => {
                    println!("  {} {:<10} {}", red("✗"), outcome.stage.name(), err)
                }
                (None, None) => {}
            }
        }
        if doc.cancelled {
            println!("  {} remaining stages cancelled", yellow("⚠"));
        }
    }

    let stats = &output.stats;
    if !progress_shown {
        eprintln!(
            "Processed {}/{} documents in {}ms ({} stages failed)",
            stats.succeeded_documents,
            stats.total_documents,
            stats.total_duration_ms,
            stats.failed_stages
        );
    }
    eprintln!(
        "   {} artifacts  ·  {} tokens in  /  {} tokens out  ·  {}ms total",
        stats.artifacts,
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
        stats.total_duration_ms,
    );
}
