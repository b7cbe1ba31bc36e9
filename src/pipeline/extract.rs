//! Text extraction: document bytes → plain text.
//!
//! Extraction is all-or-nothing per document. Any failure here becomes a
//! document-level [`ExtractionError`] and no stage runs for that document.
//!
//! The built-in [`PdfiumExtractor`] runs pdfium inside `spawn_blocking`:
//! pdfium is CPU-bound and not async-safe, and a slow parse must not stall
//! the Tokio worker threads other documents are using.

use crate::error::ExtractionError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Turns a raw document into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the document's text, pages in order.
    async fn extract(&self, content: &[u8]) -> Result<String, ExtractionError>;
}

/// Validate the `%PDF` magic bytes before handing data to pdfium.
pub fn check_pdf_magic(content: &[u8]) -> Result<(), ExtractionError> {
    if content.is_empty() {
        return Err(ExtractionError::Empty);
    }
    if !content.starts_with(b"%PDF") {
        return Err(ExtractionError::NotAPdf {
            magic: content.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

/// PDF text extraction backed by the pdfium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    lib_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    /// `lib_path` may point at the pdfium shared library itself or at the
    /// directory containing it. `None` falls back to `PDFIUM_LIB_PATH`, then
    /// to the system library search path.
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }
}

#[async_trait]
impl TextExtractor for PdfiumExtractor {
    async fn extract(&self, content: &[u8]) -> Result<String, ExtractionError> {
        check_pdf_magic(content)?;

        let bytes = content.to_vec();
        let lib_path = self.lib_path.clone();
        match tokio::task::spawn_blocking(move || extract_blocking(&bytes, lib_path.as_deref()))
            .await
        {
            Ok(result) => result,
            // Surface panics to the scheduler, which records them as
            // internal worker failures.
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(ExtractionError::EngineUnavailable {
                detail: format!("extraction task cancelled: {e}"),
            }),
        }
    }
}

fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, ExtractionError> {
    let explicit = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match explicit {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&path))
        }
        Some(path) => Pdfium::bind_to_library(&path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractionError::EngineUnavailable {
        detail: format!(
            "{e:?}. Set PDFIUM_LIB_PATH=/path/to/libpdfium or pass --pdfium-lib-path."
        ),
    })?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of text extraction.
fn extract_blocking(bytes: &[u8], lib_path: Option<&Path>) -> Result<String, ExtractionError> {
    let pdfium = bind_pdfium(lib_path)?;

    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.to_lowercase().contains("password") {
            ExtractionError::Malformed {
                detail: "document is encrypted and requires a password".into(),
            }
        } else {
            ExtractionError::Malformed { detail }
        }
    })?;

    let mut pages = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| ExtractionError::Malformed {
            detail: format!("page {}: {e:?}", idx + 1),
        })?;
        pages.push(text.all());
    }

    let text = join_pages(&pages)?;
    debug!("Extracted {} chars from {} pages", text.len(), pages.len());
    Ok(text)
}

/// Join page texts in page order; blank output is an error.
pub fn join_pages(pages: &[String]) -> Result<String, ExtractionError> {
    let text = pages.join("\n");
    if text.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(text)
}
