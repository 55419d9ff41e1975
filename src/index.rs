//! Document index: `id -> DocumentRecord`, persisted as one JSON file.
//!
//! Records keep upload order, both in memory and in the JSON object on
//! disk, so equal-score search hits rank first-uploaded first.
//!
//! The whole map is loaded at open and rewritten on every mutation. Writes
//! go to a sibling `.tmp` file which is then renamed over the index, so a
//! crash mid-write leaves the previous index intact.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

use crate::models::DocumentRecord;

pub struct DocumentIndex {
    path: PathBuf,
    records: IndexMap<String, DocumentRecord>,
}

impl DocumentIndex {
    /// Load the index at `path`. A missing file is an empty index; an
    /// unreadable or corrupt one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match load_records(&path) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("failed to load document index {}: {:#}", path.display(), e);
                IndexMap::new()
            }
        };
        Self { path, records }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &str) -> Option<&DocumentRecord> {
        self.records.get(id)
    }

    /// Insert or replace a record, then persist. A new id goes last; a
    /// replaced one keeps its position. On a failed write the in-memory map
    /// is restored.
    pub fn put(&mut self, id: &str, record: DocumentRecord) -> Result<()> {
        let previous = self.records.insert(id.to_string(), record);
        if let Err(e) = self.persist() {
            match previous {
                Some(prev) => self.records.insert(id.to_string(), prev),
                None => self.records.shift_remove(id),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Remove a record, then persist. Returns the removed record, if any.
    pub fn delete(&mut self, id: &str) -> Result<Option<DocumentRecord>> {
        let Some((position, key, removed)) = self.records.shift_remove_full(id) else {
            return Ok(None);
        };
        if let Err(e) = self.persist() {
            self.records.shift_insert(position, key, removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    /// All records in upload order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocumentRecord)> {
        self.records.iter().map(|(id, rec)| (id.as_str(), rec))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of `chunks_count` over every record.
    pub fn total_chunks(&self) -> usize {
        self.records.values().map(|r| r.chunks_count).sum()
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.records)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn load_records(path: &Path) -> Result<IndexMap<String, DocumentRecord>> {
    if !path.exists() {
        return Ok(IndexMap::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records = serde_json::from_str(&content).with_context(|| "Failed to parse index")?;
    Ok(records)
}
