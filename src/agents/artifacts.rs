//! Generated-file collection
//!
//! When a turn completes, files the assistant produced (charts, CSV exports,
//! HTML reports) are downloaded into the artifact directory. The file type is
//! decided by [`classify`] from the content's leading bytes.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::agents::domain::{FileObject, ThreadMessage};
use crate::agents::transport::FileTransport;

/// Receiver of the messages of a completed turn
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Detect and store generated files; returns the paths written
    async fn collect(&self, messages: &[ThreadMessage]) -> Vec<PathBuf>;
}

/// Kind of a downloaded artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Png,
    Jpeg,
    Html,
    Csv,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Png => "png",
            ArtifactKind::Jpeg => "jpg",
            ArtifactKind::Html => "html",
            ArtifactKind::Csv => "csv",
        }
    }
}

const PNG_SIGNATURE: &[u8] = b"\x89PNG";
const JPEG_SIGNATURE: &[u8] = b"\xff\xd8\xff";
const HTML_MARKERS: &[&[u8]] = &[b"<html", b"<!doctype html"];
/// How far into the content HTML markers are looked for
const HTML_WINDOW: usize = 64;

/// Classify content by signature: PNG, then JPEG, then HTML markers near the
/// start; anything else is treated as CSV.
pub fn classify(bytes: &[u8]) -> ArtifactKind {
    if bytes.starts_with(PNG_SIGNATURE) {
        return ArtifactKind::Png;
    }
    if bytes.starts_with(JPEG_SIGNATURE) {
        return ArtifactKind::Jpeg;
    }

    let head = &bytes[..bytes.len().min(HTML_WINDOW)];
    let lowered = head.to_ascii_lowercase();
    let leading = lowered
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|start| &lowered[start..])
        .unwrap_or(&[]);
    if HTML_MARKERS.iter().any(|marker| leading.starts_with(marker)) {
        return ArtifactKind::Html;
    }

    ArtifactKind::Csv
}

/// Downloads generated files through a [`FileTransport`]
pub struct ArtifactCollector {
    files: Arc<dyn FileTransport>,
    output_dir: PathBuf,
    downloaded: Mutex<HashSet<String>>,
}

impl ArtifactCollector {
    pub fn new(files: Arc<dyn FileTransport>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            files,
            output_dir: output_dir.into(),
            downloaded: Mutex::new(HashSet::new()),
        }
    }

    async fn download(&self, file: &FileObject) -> Option<PathBuf> {
        let content = match self.files.file_content(&file.id).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(file_id = %file.id, "Failed to download file: {}", e);
                return None;
            }
        };

        let kind = classify(&content);
        let stem = match file.stem() {
            "" => file.id.as_str(),
            stem => stem,
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            tracing::warn!("Failed to create artifact directory {}: {}", self.output_dir.display(), e);
            return None;
        }

        // Files from different runs often share a name such as `chart`
        let mut path = self.output_dir.join(format!("{}.{}", stem, kind.extension()));
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            path = self
                .output_dir
                .join(format!("{}-{}.{}", stem, file.id, kind.extension()));
        }
        match tokio::fs::write(&path, &content).await {
            Ok(()) => {
                tracing::info!(file_id = %file.id, "File downloaded to {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Failed to write {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl ArtifactSink for ArtifactCollector {
    async fn collect(&self, messages: &[ThreadMessage]) -> Vec<PathBuf> {
        let referenced: Vec<String> = {
            let downloaded = self.downloaded.lock().await;
            let mut seen = HashSet::new();
            messages
                .iter()
                .flat_map(|m| m.referenced_files())
                .filter(|id| !downloaded.contains(*id) && seen.insert(id.to_string()))
                .map(str::to_string)
                .collect()
        };
        if referenced.is_empty() {
            return Vec::new();
        }

        let catalog: HashMap<String, FileObject> = match self.files.list_files().await {
            Ok(files) => files.into_iter().map(|f| (f.id.clone(), f)).collect(),
            Err(e) => {
                tracing::warn!("Failed to list files for artifact collection: {}", e);
                return Vec::new();
            }
        };

        let mut written = Vec::new();
        for file_id in referenced {
            let Some(file) = catalog.get(&file_id) else {
                tracing::debug!(file_id = %file_id, "Referenced file no longer exists");
                continue;
            };
            if file.is_user_upload() {
                continue;
            }
            if let Some(path) = self.download(file).await {
                self.downloaded.lock().await.insert(file_id);
                written.push(path);
            }
        }
        written
    }
}
