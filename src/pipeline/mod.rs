//! Pipeline pieces for batch document processing.
//!
//! Each submodule owns exactly one concern. The three collaborator
//! boundaries ([`extract::TextExtractor`], [`llm::CompletionClient`],
//! [`artifact::ArtifactWriter`]) are traits so every piece can be tested with
//! in-memory fakes and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ scheduler ──▶ stages ──────────────────────────────▶ aggregate
//! (paths)   (W workers)   extract ─▶ llm ─▶ postprocess ─▶ artifact   (results)
//! ```
//!
//! 1. [`input`]     — load local paths or URLs into in-memory documents
//! 2. [`scheduler`] — fixed worker pool over a shared document queue
//! 3. [`stages`]    — one document: extract once, then translate, summarize,
//!    analyze in that order
//! 4. [`extract`]   — PDF text via pdfium; runs in `spawn_blocking`
//! 5. [`llm`]       — completion calls with retry/backoff; the only network I/O
//!    besides URL inputs
//! 6. [`postprocess`] — deterministic cleanup of generated text
//! 7. [`artifact`]  — one Markdown file per successful (document, stage)
//! 8. [`aggregate`] — the single writer of the batch result and progress

pub mod aggregate;
pub mod artifact;
pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod scheduler;
pub mod stages;
