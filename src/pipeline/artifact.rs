//! Artifact persistence: one Markdown file per successful (document, stage).
//!
//! Files are written atomically (temp file + rename) so a crash or a full
//! disk never leaves a half-written artifact behind under the final name.
//!
//! Sanitising is lossy (`q3 report.pdf` and `q3_report.pdf` share a stem), so
//! the writer hands each document its own stem for the lifetime of the
//! writer: the first document to claim a stem keeps it, later ones get `-2`,
//! `-3`, … Claims compare case-insensitively to stay distinct on
//! case-insensitive file systems.

use crate::error::WriteError;
use crate::output::Stage;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// MIME type of the artifacts produced by [`MarkdownArtifactWriter`].
pub const ARTIFACT_MIME_TYPE: &str = "text/markdown";

/// Persists a stage's generated text and returns where it went.
#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    async fn write_artifact(
        &self,
        document_name: &str,
        stage: Stage,
        body: &str,
    ) -> Result<PathBuf, WriteError>;
}

/// Title shown at the top of an artifact.
pub fn artifact_title(document_name: &str, stage: Stage) -> String {
    format!("{} - {}", document_name, stage.label())
}

/// Sanitised file-name stem for a document.
///
/// Path separators and other characters that are unsafe in file names are
/// replaced with `_`; Unicode letters are kept.
pub fn artifact_stem(document_name: &str) -> String {
    let stem: String = document_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.trim_matches(['.', '_']).is_empty() {
        "document".to_string()
    } else {
        stem
    }
}

/// File name for a (document, stage) pair: `<stem>_<stage>.md`.
///
/// This is the name a document gets when no other document in the batch has
/// claimed the same stem; [`MarkdownArtifactWriter`] suffixes it otherwise.
pub fn artifact_file_name(document_name: &str, stage: Stage) -> String {
    format!("{}_{}.md", artifact_stem(document_name), stage.name())
}

/// Stems handed out so far, keyed both ways.
#[derive(Debug, Default)]
struct StemClaims {
    by_document: HashMap<String, String>,
    claimed: HashSet<String>,
}

impl StemClaims {
    fn claim(&mut self, document_name: &str) -> String {
        if let Some(stem) = self.by_document.get(document_name) {
            return stem.clone();
        }
        let base = artifact_stem(document_name);
        let mut stem = base.clone();
        let mut n = 2;
        while self.claimed.contains(&stem.to_lowercase()) {
            stem = format!("{base}-{n}");
            n += 1;
        }
        self.claimed.insert(stem.to_lowercase());
        self.by_document.insert(document_name.to_string(), stem.clone());
        stem
    }
}

/// Writes artifacts as Markdown files into one directory.
///
/// Clones share stem claims, so every clone used within one batch keeps
/// (document, stage) paths distinct.
#[derive(Debug, Clone)]
pub struct MarkdownArtifactWriter {
    dir: PathBuf,
    stems: Arc<Mutex<StemClaims>>,
}

impl MarkdownArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stems: Arc::default(),
        }
    }

    fn file_name(&self, document_name: &str, stage: Stage) -> String {
        // Never held across an await; a poisoned lock still holds valid claims.
        let stem = self
            .stems
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .claim(document_name);
        format!("{}_{}.md", stem, stage.name())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactWriter for MarkdownArtifactWriter {
    async fn write_artifact(
        &self,
        document_name: &str,
        stage: Stage,
        body: &str,
    ) -> Result<PathBuf, WriteError> {
        let path = self.dir.join(self.file_name(document_name, stage));
        let io_err = |e: std::io::Error| WriteError::Io {
            path: path.clone(),
            detail: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        let mut contents = format!("# {}\n\n{}", artifact_title(document_name, stage), body);
        if !contents.ends_with('\n') {
            contents.push('\n');
        }

        let tmp_path = path.with_extension("md.tmp");
        tokio::fs::write(&tmp_path, contents.as_bytes())
            .await
            .map_err(io_err)?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(io_err)?;

        debug!("Wrote artifact {}", path.display());
        Ok(path)
    }
}
