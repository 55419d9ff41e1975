//! RAG service: upload, query, list, delete, and stats over one store.
//!
//! [`RagService`] owns the [`DocumentStore`] behind a `tokio::sync::RwLock`.
//! Ingest and delete take the write lock, so index mutations are serialized;
//! search, listing, and stats share the read lock. Store work holding a
//! guard runs on the blocking pool. LLM calls happen outside the lock.

use anyhow::Context;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::RagError;
use crate::extract::{extract_text, file_extension, ExtractError};
use crate::llm::Generator;
use crate::models::{
    truncate_with_ellipsis, DocumentResponse, Metadata, QueryRequest, QueryResponse, SourceInfo,
};
use crate::store::{remove_if_present, DocumentStore, StoreStats};

/// Characters of extracted text echoed back after upload.
const UPLOAD_PREVIEW_CHARS: usize = 500;
/// Characters of each source's context shown in a query response.
const SOURCE_PREVIEW_CHARS: usize = 200;
/// Word budget for the post-upload summary.
const SUMMARY_MAX_WORDS: u32 = 200;

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub document_store_stats: StoreStats,
    pub system_status: String,
}

pub struct RagService {
    config: Config,
    uploads_dir: PathBuf,
    store: Arc<RwLock<DocumentStore>>,
    generator: Generator,
}

impl RagService {
    pub fn new(config: Config, generator: Generator) -> anyhow::Result<Self> {
        let uploads_dir = config.storage.uploads_dir();
        std::fs::create_dir_all(&uploads_dir)
            .with_context(|| format!("Failed to create {}", uploads_dir.display()))?;
        let store = DocumentStore::open(
            config.storage.markdown_dir(),
            config.storage.index_path(),
            config.chunking.clone(),
        )?;
        Ok(Self {
            config,
            uploads_dir,
            store: Arc::new(RwLock::new(store)),
            generator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `f` against the store under a shared guard on the blocking pool.
    async fn read_store<R, F>(&self, f: F) -> Result<R, RagError>
    where
        F: FnOnce(&DocumentStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        let store = self.store.clone().read_owned().await;
        Ok(tokio::task::spawn_blocking(move || f(&store))
            .await
            .context("store task failed")?)
    }

    /// Run `f` against the store under the write guard on the blocking pool.
    async fn write_store<R, F>(&self, f: F) -> Result<R, RagError>
    where
        F: FnOnce(&mut DocumentStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        let mut store = self.store.clone().write_owned().await;
        Ok(tokio::task::spawn_blocking(move || f(&mut store))
            .await
            .context("store task failed")?)
    }

    /// Validate, save, extract, and index an uploaded file.
    ///
    /// Validation failures touch nothing on disk. Once the raw file is
    /// saved, any later failure removes it again.
    pub async fn upload_document(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<DocumentResponse, RagError> {
        let started = Instant::now();
        let basename = self.validate_upload(filename, bytes.len() as u64)?;

        let raw_path = self
            .uploads_dir
            .join(format!("{}_{}", uuid::Uuid::new_v4(), basename));
        tokio::fs::write(&raw_path, bytes)
            .await
            .with_context(|| format!("Failed to save upload {}", raw_path.display()))?;

        let (id, text) = match self.ingest_saved(bytes, &basename, &raw_path).await {
            Ok(done) => done,
            Err(e) => {
                remove_if_present(&raw_path);
                return Err(e);
            }
        };

        let summary = self
            .generator
            .summarize_document(&text, SUMMARY_MAX_WORDS)
            .await;
        let processing_time = started.elapsed().as_secs_f64();
        tracing::info!(id = %id, filename = %basename, processing_time, "upload processed");

        Ok(DocumentResponse {
            id,
            filename: basename,
            content_preview: truncate_with_ellipsis(&text, UPLOAD_PREVIEW_CHARS),
            upload_time: chrono::Utc::now(),
            metadata: serde_json::json!({
                "processing_time": processing_time,
                "summary": summary,
                "file_size": bytes.len(),
                "storage_type": "markdown_file",
            }),
        })
    }

    /// Returns the sanitized basename on success.
    fn validate_upload(&self, filename: &str, size: u64) -> Result<String, RagError> {
        let basename = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| RagError::validation("Missing file name"))?;

        let upload = &self.config.upload;
        let ext = file_extension(&basename);
        if !upload.allows_extension(&ext) {
            return Err(RagError::validation(format!(
                "File type .{} not allowed. Allowed types: {}",
                ext,
                upload.allowed_extensions.join(", ")
            )));
        }
        if size > upload.max_file_size {
            return Err(RagError::validation(format!(
                "File size {} exceeds maximum allowed size {}",
                size, upload.max_file_size
            )));
        }
        Ok(basename)
    }

    async fn ingest_saved(
        &self,
        bytes: &[u8],
        filename: &str,
        raw_path: &Path,
    ) -> Result<(String, String), RagError> {
        let ext = file_extension(filename);
        let owned = bytes.to_vec();
        let text = extract_blocking(filename, move || extract_text(&owned, &ext)).await?;

        let id = uuid::Uuid::new_v4().to_string();
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), filename.into());
        metadata.insert("file_path".into(), raw_path.display().to_string().into());
        metadata.insert("upload_time".into(), chrono::Utc::now().to_rfc3339().into());
        metadata.insert("file_size".into(), bytes.len().into());
        metadata.insert(
            "sha256".into(),
            format!("{:x}", Sha256::digest(bytes)).into(),
        );

        let filename = filename.to_string();
        let added = self
            .write_store(move |store| {
                store
                    .add_document(&id, &filename, &text, metadata)
                    .map(|_| (id, text))
            })
            .await??;
        Ok(added)
    }

    /// Search, then generate an answer from whatever was found.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse, RagError> {
        let started = Instant::now();
        if request.query.trim().is_empty() {
            return Err(RagError::validation("Query must not be empty"));
        }
        let max_results = request
            .max_results
            .unwrap_or(self.config.retrieval.default_max_results);
        if max_results < 1 {
            return Err(RagError::validation("max_results must be >= 1"));
        }

        let query = request.query.clone();
        let results = self
            .read_store(move |store| store.search(&query, max_results))
            .await?;
        let answer = self
            .generator
            .generate_answer(&request.query, &results)
            .await;

        let sources = results
            .iter()
            .map(|r| {
                let mut preview: String = r.content.chars().take(SOURCE_PREVIEW_CHARS).collect();
                preview.push_str("...");
                SourceInfo {
                    source: r.metadata.source.clone(),
                    document_id: r.metadata.document_id.clone(),
                    score: r.score,
                    content_preview: preview,
                }
            })
            .collect();

        Ok(QueryResponse {
            query: request.query,
            answer,
            sources,
            response_time: started.elapsed().as_secs_f64(),
        })
    }

    /// Every readable document, in upload order.
    pub async fn list_documents(&self) -> Result<Vec<DocumentResponse>, RagError> {
        let docs = self.read_store(|store| store.list_documents()).await?;
        Ok(docs
            .into_iter()
            .map(|doc| DocumentResponse {
                id: doc.id,
                filename: doc.record.filename,
                content_preview: doc.preview,
                upload_time: doc.record.upload_time,
                metadata: serde_json::json!({
                    "chunks_count": doc.record.chunks_count,
                    "content_length": doc.record.content_length,
                    "storage_type": "markdown",
                }),
            })
            .collect())
    }

    /// Returns `false` when no document has this id.
    pub async fn delete_document(&self, id: &str) -> Result<bool, RagError> {
        let id = id.to_string();
        Ok(self
            .write_store(move |store| store.delete_document(&id))
            .await??)
    }

    pub async fn system_stats(&self) -> Result<SystemStats, RagError> {
        let (readable, document_store_stats) = self
            .read_store(|store| (store.readable_count(), store.stats()))
            .await?;
        Ok(SystemStats {
            total_documents: readable,
            total_chunks: document_store_stats.total_chunks,
            document_store_stats,
            system_status: "operational".to_string(),
        })
    }
}

/// Run an extractor on the blocking pool. An extractor that panics is
/// reported as an extraction failure of `filename`.
async fn extract_blocking<F>(filename: &str, extract: F) -> Result<String, RagError>
where
    F: FnOnce() -> Result<String, ExtractError> + Send + 'static,
{
    let outcome = match tokio::task::spawn_blocking(extract).await {
        Ok(result) => result,
        Err(e) => Err(ExtractError::Aborted(e.to_string())),
    };
    outcome.map_err(|source| RagError::Extraction {
        filename: filename.to_string(),
        source,
    })
}
