//! Service-level error taxonomy.

use thiserror::Error;

use crate::extract::ExtractError;

/// Errors surfaced by [`RagService`](crate::rag::RagService).
///
/// LLM failures never appear here; they are folded into the answer text.
#[derive(Debug, Error)]
pub enum RagError {
    /// Rejected input (extension, size, empty query). Nothing was written.
    #[error("{0}")]
    Validation(String),

    /// The uploaded file could not be turned into text.
    #[error("failed to process {filename}: {source}")]
    Extraction {
        filename: String,
        #[source]
        source: ExtractError,
    },

    /// Index or artifact I/O failed.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl RagError {
    pub fn validation(message: impl Into<String>) -> Self {
        RagError::Validation(message.into())
    }
}
