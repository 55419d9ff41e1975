//! Keyword search over rendered document artifacts.
//!
//! There is no search index: every query reads each document's markdown
//! artifact and scores it with a fixed heuristic.
//!
//! # Scoring
//!
//! | Signal | Points |
//! |--------|--------|
//! | whole query occurs in the document (case-insensitive) | 10 |
//! | each query keyword occurring anywhere in the document | 3 |
//!
//! Documents scoring 0 are dropped. For the rest, context is gathered from
//! matching lines (±3 lines around each) or, failing that, from blank-line
//! separated sections containing a keyword. A document with no usable
//! context is dropped as well.

use anyhow::{Context, Result};

use crate::index::DocumentIndex;
use crate::keywords::extract_keywords;
use crate::models::{truncate_with_ellipsis, ResultMetadata, SearchResult};

const EXACT_MATCH_SCORE: u32 = 10;
const KEYWORD_MATCH_SCORE: u32 = 3;
/// Lines of context taken on each side of a matching line.
const CONTEXT_LINES: usize = 3;
/// Context windows this short (in characters) are not worth returning.
const MIN_CONTEXT_CHARS: usize = 10;
const MAX_CONTEXT_CHARS: usize = 400;
/// Context snippets kept per document.
const MAX_SNIPPETS: usize = 3;

/// Score and context for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredContent {
    pub score: u32,
    pub snippets: Vec<String>,
}

/// Search every indexed document and return at most `max_results` hits,
/// highest score first. Ties keep index (upload) order.
///
/// Documents whose artifact cannot be read are logged and skipped.
pub fn search(index: &DocumentIndex, query: &str, max_results: usize) -> Vec<SearchResult> {
    if query.trim().is_empty() {
        return Vec::new();
    }

    let query_lower = query.to_lowercase();
    let keywords = extract_keywords(&query_lower);
    tracing::debug!(query, ?keywords, "searching documents");

    let mut results = Vec::new();
    for (doc_id, record) in index.iter() {
        if !record.storage_location.exists() {
            continue;
        }

        let content = match read_artifact(&record.storage_location) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(doc_id, "error searching document: {:#}", e);
                continue;
            }
        };

        let Some(scored) = score_content(&query_lower, &keywords, &content) else {
            continue;
        };
        tracing::debug!(
            filename = %record.filename,
            score = scored.score,
            snippets = scored.snippets.len(),
            "scored document"
        );

        results.push(SearchResult {
            content: scored.snippets.join("\n\n"),
            metadata: ResultMetadata {
                document_id: doc_id.to_string(),
                source: record.filename.clone(),
                upload_time: record.upload_time,
            },
            score: scored.score,
        });
    }

    // Stable: equal scores stay in index order.
    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(max_results);
    results
}

fn read_artifact(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Score `content` against an already-lowercased query and its keywords.
///
/// Returns `None` when the document scores 0 or yields no context.
/// At most [`MAX_SNIPPETS`] snippets are returned.
pub fn score_content(query_lower: &str, keywords: &[String], content: &str) -> Option<ScoredContent> {
    let content_lower = content.to_lowercase();

    let mut score = 0;
    if content_lower.contains(query_lower) {
        score += EXACT_MATCH_SCORE;
    }
    for keyword in keywords {
        if content_lower.contains(keyword.as_str()) {
            score += KEYWORD_MATCH_SCORE;
        }
    }
    if score == 0 {
        return None;
    }

    let mut snippets = line_contexts(query_lower, keywords, content);
    if snippets.is_empty() {
        snippets = section_contexts(keywords, content);
    }
    if snippets.is_empty() {
        return None;
    }

    snippets.truncate(MAX_SNIPPETS);
    Some(ScoredContent { score, snippets })
}

fn keyword_hits(keywords: &[String], text_lower: &str) -> usize {
    keywords
        .iter()
        .filter(|k| text_lower.contains(k.as_str()))
        .count()
}

/// Context windows around every line that matches the query.
///
/// A line matches when it contains the whole query, at least two keywords,
/// or (for queries with at most two keywords) any keyword.
fn line_contexts(query_lower: &str, keywords: &[String], content: &str) -> Vec<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut contexts = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let line_lower = line.to_lowercase();
        let matches = if line_lower.contains(query_lower) {
            true
        } else {
            let hits = keyword_hits(keywords, &line_lower);
            hits >= 2 || (hits >= 1 && keywords.len() <= 2)
        };
        if !matches {
            continue;
        }

        let start = i.saturating_sub(CONTEXT_LINES);
        let end = (i + CONTEXT_LINES + 1).min(lines.len());
        let context = lines[start..end].join("\n");
        let context = context.trim();
        if context.chars().count() > MIN_CONTEXT_CHARS {
            contexts.push(truncate_with_ellipsis(context, MAX_CONTEXT_CHARS));
        }
    }

    contexts
}

/// Blank-line separated sections that contain at least one keyword.
fn section_contexts(keywords: &[String], content: &str) -> Vec<String> {
    content
        .split("\n\n")
        .filter(|section| keyword_hits(keywords, &section.to_lowercase()) >= 1)
        .map(|section| truncate_with_ellipsis(section, MAX_CONTEXT_CHARS))
        .collect()
}
