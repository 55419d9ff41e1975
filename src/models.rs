//! Core data models used throughout mini-rag.
//!
//! These types represent the document records, search results, and API
//! response shapes that flow through ingestion and retrieval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A scalar metadata value. Serialized without a tag, so the JSON looks
/// like a plain object of strings and numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Text(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self {
        MetadataValue::Int(v as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

/// Free-form per-document attributes, set once at ingestion.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Persisted index entry describing one ingested document.
///
/// The document id is the key this record is stored under in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    /// Path of the rendered markdown artifact.
    pub storage_location: PathBuf,
    pub upload_time: DateTime<Utc>,
    /// Length of the extracted text, in characters.
    pub content_length: usize,
    pub chunks_count: usize,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Document metadata subset attached to each search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub document_id: String,
    pub source: String,
    pub upload_time: DateTime<Utc>,
}

/// A single ranked search hit. Recomputed on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub metadata: ResultMetadata,
    pub score: u32,
}

/// Document summary returned by upload and listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: String,
    pub filename: String,
    pub content_preview: String,
    pub upload_time: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Accepted for compatibility; keyword retrieval has no similarity scale.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_similarity_threshold() -> f64 {
    0.7
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: None,
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// One cited source in a [`QueryResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub source: String,
    pub document_id: String,
    pub score: u32,
    pub content_preview: String,
}

/// Answer plus the sources it was conditioned on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SourceInfo>,
    /// Wall-clock seconds spent on search and generation.
    pub response_time: f64,
}

/// Truncate `text` to `max_chars` characters, appending `...` when cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
