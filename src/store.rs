//! Document store: markdown artifacts on disk plus the document index.
//!
//! Each document is rendered to `<markdown_dir>/<id>.md`. The artifact holds
//! a small header, the full extracted text between two `---` rules, and the
//! ingestion-time chunks for inspection. Search reads these artifacts
//! directly; the index only tracks where they live.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::index::DocumentIndex;
use crate::models::{truncate_with_ellipsis, DocumentRecord, Metadata, SearchResult};
use crate::search;

/// Characters of original text shown in listings.
const PREVIEW_CHARS: usize = 500;

/// A listable document: its index record plus a preview read from the artifact.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub record: DocumentRecord,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub storage_type: String,
    pub markdown_directory: String,
}

pub struct DocumentStore {
    markdown_dir: PathBuf,
    chunking: ChunkingConfig,
    index: DocumentIndex,
}

impl DocumentStore {
    pub fn open(
        markdown_dir: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
        chunking: ChunkingConfig,
    ) -> Result<Self> {
        let markdown_dir = markdown_dir.into();
        std::fs::create_dir_all(&markdown_dir)
            .with_context(|| format!("Failed to create {}", markdown_dir.display()))?;
        let index = DocumentIndex::open(index_path);
        tracing::info!(
            documents = index.len(),
            dir = %markdown_dir.display(),
            "document store opened"
        );
        Ok(Self {
            markdown_dir,
            chunking,
            index,
        })
    }

    pub fn markdown_dir(&self) -> &Path {
        &self.markdown_dir
    }

    pub fn get(&self, id: &str) -> Option<&DocumentRecord> {
        self.index.get(id)
    }

    /// Chunk `text`, write its artifact, and record it in the index.
    pub fn add_document(
        &mut self,
        id: &str,
        filename: &str,
        text: &str,
        metadata: Metadata,
    ) -> Result<DocumentRecord> {
        let chunks = chunk_text(text, self.chunking.chunk_size, self.chunking.chunk_overlap)?;
        let upload_time = Utc::now();
        let content_length = text.chars().count();

        let artifact = render_artifact(id, filename, text, &chunks, upload_time);
        let path = self.markdown_dir.join(format!("{}.md", id));
        std::fs::write(&path, artifact)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let record = DocumentRecord {
            filename: filename.to_string(),
            storage_location: path.clone(),
            upload_time,
            content_length,
            chunks_count: chunks.len(),
            metadata,
        };

        if let Err(e) = self.index.put(id, record.clone()) {
            remove_if_present(&path);
            return Err(e);
        }

        tracing::info!(id, filename, chunks = chunks.len(), "document added");
        Ok(record)
    }

    /// Remove a document's artifact and index entry. Returns `false` when
    /// the id is unknown.
    pub fn delete_document(&mut self, id: &str) -> Result<bool> {
        let Some(record) = self.index.get(id) else {
            return Ok(false);
        };
        let path = record.storage_location.clone();

        self.index.delete(id)?;
        remove_if_present(&path);
        tracing::info!(id, "document deleted");
        Ok(true)
    }

    /// Every document whose artifact can still be read, in index order.
    pub fn list_documents(&self) -> Vec<StoredDocument> {
        self.index
            .iter()
            .filter_map(|(id, record)| {
                let content = match std::fs::read_to_string(&record.storage_location) {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::debug!(id, "skipping unreadable artifact: {}", e);
                        return None;
                    }
                };
                Some(StoredDocument {
                    id: id.to_string(),
                    record: record.clone(),
                    preview: artifact_preview(&content),
                })
            })
            .collect()
    }

    /// Records whose artifact can be opened. Opens each file without
    /// reading it.
    pub fn readable_count(&self) -> usize {
        self.index
            .iter()
            .filter(|(_, record)| std::fs::File::open(&record.storage_location).is_ok())
            .count()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_documents: self.index.len(),
            total_chunks: self.index.total_chunks(),
            storage_type: "markdown_files".to_string(),
            markdown_directory: self.markdown_dir.display().to_string(),
        }
    }

    pub fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        search::search(&self.index, query, max_results)
    }
}

fn render_artifact(
    id: &str,
    filename: &str,
    text: &str,
    chunks: &[String],
    upload_time: DateTime<Utc>,
) -> String {
    let mut out = format!(
        "# {}\n\n**Document ID**: {}\n**Upload Time**: {}\n**Content Length**: {} characters\n**Chunks**: {}\n\n---\n\n{}\n\n---\n\n## Document Chunks\n\n",
        filename,
        id,
        upload_time.to_rfc3339(),
        text.chars().count(),
        chunks.len(),
        text
    );
    for (i, chunk) in chunks.iter().enumerate() {
        let _ = write!(out, "### Chunk {}\n\n{}\n\n---\n\n", i + 1, chunk);
    }
    out
}

/// The original text section of an artifact: whatever sits between the
/// first and second `---`.
fn artifact_preview(content: &str) -> String {
    let mut parts = content.splitn(3, "---");
    let section = match (parts.next(), parts.next()) {
        (Some(_), Some(body)) => body.trim(),
        _ => "",
    };
    truncate_with_ellipsis(section, PREVIEW_CHARS)
}

/// Best-effort file removal: absence is fine, other failures are logged.
pub(crate) fn remove_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("failed to remove {}: {}", path.display(), e),
    }
}
