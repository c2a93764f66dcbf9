
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::{RagError, Result};

/// Extensions accepted as lecture material
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "docx"];

/// Extensions whose text can be read directly
const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Outcome of extracting text from one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Text(String),
    ExtractionFailed { reason: String },
}

impl Extraction {
    #[inline]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            reason: reason.into(),
        }
    }

    /// Convert into a result, attributing a failure to `path`
    #[inline]
    pub fn into_result(self, path: &str) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::ExtractionFailed { reason } => Err(RagError::Extraction {
                path: path.to_string(),
                reason,
            }),
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Whether `path` names a file the ingestion front door accepts
#[inline]
pub fn is_supported(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Extract plain text from a lecture file.
///
/// Plain text and Markdown are read directly (invalid UTF-8 replaced). PDF and DOCX parsing
/// is left to an external extractor, so those files report `ExtractionFailed`, as do
/// unreadable files and files without any text.
#[inline]
pub async fn extract_text(path: &Path) -> Extraction {
    let Some(ext) = extension_of(path) else {
        return Extraction::failed("file has no extension");
    };

    if !PLAIN_TEXT_EXTENSIONS.contains(&ext.as_str()) {
        let reason = if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            format!("no text extractor available for .{ext} files")
        } else {
            format!("unsupported file type .{ext}")
        };
        return Extraction::failed(reason);
    }

    match fs::read(path).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if text.trim().is_empty() {
                Extraction::failed("no text")
            } else {
                debug!("Extracted {} bytes from {}", text.len(), path.display());
                Extraction::Text(text)
            }
        }
        Err(e) => Extraction::failed(format!("failed to read file: {e}")),
    }
}

/// All supported files under `dir`, recursively, in sorted path order
#[inline]
pub async fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(path);
            } else if is_supported(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    debug!("Found {} lecture files under {}", files.len(), dir.display());
    Ok(files)
}
