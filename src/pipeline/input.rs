//! Input loading: turn user-supplied paths or URLs into [`Document`]s.
//!
//! Loading is the one place where a missing file is fatal: a batch with an
//! unreadable input never starts, so the user fixes the path instead of
//! getting a half-processed batch. Whether the bytes are actually a PDF is
//! checked later by the extractor, per document.

use crate::error::DocStageError;
use crate::output::Document;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Inputs loaded at the same time. Downloads dominate; local reads are cheap.
const LOAD_CONCURRENCY: usize = 4;

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load every input, keeping input order. Fails on the first input that
/// can't be read.
pub async fn load_documents<S: AsRef<str>>(
    inputs: &[S],
    timeout_secs: u64,
) -> Result<Vec<Document>, DocStageError> {
    stream::iter(
        inputs
            .iter()
            .map(|input| load_document(input.as_ref(), timeout_secs)),
    )
    .buffered(LOAD_CONCURRENCY)
    .try_collect()
    .await
}

/// Load one input: download a URL, or read a local file.
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<Document, DocStageError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

async fn read_local(path: &Path) -> Result<Document, DocStageError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => DocStageError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DocStageError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Loaded {} ({} bytes)", path.display(), bytes.len());
    Ok(Document::new(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, DocStageError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocStageError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let timeout_or_failure = |e: reqwest::Error| {
        if e.is_timeout() {
            DocStageError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocStageError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(timeout_or_failure)?;

    if !response.status().is_success() {
        return Err(DocStageError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = extract_filename(url);
    let bytes = response.bytes().await.map_err(timeout_or_failure)?;

    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(Document::new(name, bytes.to_vec()))
}

/// Extract a reasonable document name from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

/// Expand directory inputs into the PDF files they contain (non-recursive,
/// sorted by name). Other inputs are passed through unchanged.
pub fn expand_inputs<S: AsRef<str>>(inputs: &[S]) -> Vec<String> {
    let mut expanded = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        let path = PathBuf::from(input);
        if is_url(input) || !path.is_dir() {
            expanded.push(input.to_string());
            continue;
        }

        let mut pdfs: Vec<String> = std::fs::read_dir(&path)
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| {
                p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
            })
            .map(|p| p.display().to_string())
            .collect();
        pdfs.sort();
        debug!("Expanded {} to {} PDF files", path.display(), pdfs.len());
        expanded.extend(pdfs);
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(
            extract_filename("https://example.com/reports/q3.pdf?x=1"),
            "q3.pdf"
        );
        assert_eq!(extract_filename("https://example.com/download"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn local_file_becomes_named_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annual.pdf");
        std::fs::write(&path, b"%PDF-1.7 body").unwrap();

        let docs = load_documents(&[path.display().to_string()], 5).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "annual.pdf");
        assert_eq!(&docs[0].content[..], b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let err = load_documents(&["/definitely/not/here.pdf"], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DocStageError::FileNotFound { .. }));
    }

    #[test]
    fn directories_expand_to_sorted_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let dir_str = dir.path().display().to_string();

        let expanded = expand_inputs(&[dir_str.as_str(), "https://x.test/y.pdf"]);
        assert_eq!(expanded.len(), 3);
        assert!(expanded[0].ends_with("a.PDF"));
        assert!(expanded[1].ends_with("b.pdf"));
        assert_eq!(expanded[2], "https://x.test/y.pdf");
    }
}
