//! Sentence-boundary text chunker.
//!
//! Splits extracted document text into overlapping windows of at most
//! `chunk_size` characters. When a window ends before the end of the text,
//! it is pulled back to the last `.` in its second half so chunks tend to
//! end on sentence boundaries. Consecutive windows overlap by
//! `chunk_overlap` characters measured back from the previous window's end.
//!
//! Lengths are counted in characters, not bytes.

use anyhow::{bail, Result};

/// Split `text` into trimmed, non-empty chunks.
///
/// Fails when `chunk_size` is zero or `chunk_overlap >= chunk_size`, since
/// such a configuration cannot make forward progress.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        bail!("chunk_size must be > 0");
    }
    if chunk_overlap >= chunk_size {
        bail!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            chunk_overlap,
            chunk_size
        );
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len <= chunk_size {
        return Ok(vec![text.trim().to_string()]);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = start + chunk_size;

        if end < len {
            if let Some(period) = chars[start..end].iter().rposition(|&c| c == '.') {
                let period = start + period;
                if period > start + chunk_size / 2 {
                    end = period + 1;
                }
            }
        }

        let window: String = chars[start..end.min(len)].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        let next = end.saturating_sub(chunk_overlap);
        start = if next > start { next } else { end };
    }

    Ok(chunks)
}
