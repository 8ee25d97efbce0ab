use super::types::{ChunkRecord, FileRecord, MetadataStore};
use crate::error::{Result, TransferError};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry as ChunkEntry;
use std::sync::atomic::{AtomicI64, Ordering};

struct FileEntry {
    record: FileRecord,
    chunks: BTreeMap<u32, ChunkRecord>,
}

/// In-process metadata backend. State is lost on restart.
pub struct MemoryMetadataStore {
    next_id: AtomicI64,
    names: DashMap<String, i64>,
    files: DashMap<i64, FileEntry>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            names: DashMap::new(),
            files: DashMap::new(),
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.files.iter().map(|entry| entry.value().chunks.len()).sum()
    }
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create_file(
        &self,
        filename: &str,
        total_chunks: u32,
        total_size: u64,
    ) -> Result<FileRecord> {
        match self.names.entry(filename.to_string()) {
            Entry::Occupied(_) => Err(TransferError::Conflict(format!(
                "file {} already exists",
                filename
            ))),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let record = FileRecord {
                    id,
                    filename: filename.to_string(),
                    total_chunks,
                    total_size,
                };
                self.files.insert(
                    id,
                    FileEntry {
                        record: record.clone(),
                        chunks: BTreeMap::new(),
                    },
                );
                slot.insert(id);
                Ok(record)
            }
        }
    }

    async fn update_file(&self, file_id: i64, total_chunks: u32, total_size: u64) -> Result<()> {
        let mut entry = self
            .files
            .get_mut(&file_id)
            .ok_or_else(|| TransferError::NotFound(format!("file id {}", file_id)))?;
        entry.record.total_chunks = total_chunks;
        entry.record.total_size = total_size;
        Ok(())
    }

    async fn insert_chunk(&self, chunk: &ChunkRecord) -> Result<()> {
        let mut entry = self
            .files
            .get_mut(&chunk.file_id)
            .ok_or_else(|| TransferError::NotFound(format!("file id {}", chunk.file_id)))?;
        match entry.chunks.entry(chunk.chunk_number) {
            ChunkEntry::Occupied(_) => Err(TransferError::Conflict(format!(
                "chunk {} of file id {} already recorded",
                chunk.chunk_number, chunk.file_id
            ))),
            ChunkEntry::Vacant(slot) => {
                slot.insert(chunk.clone());
                Ok(())
            }
        }
    }

    async fn list_chunks(&self, file_id: i64) -> Result<Vec<ChunkRecord>> {
        Ok(self
            .files
            .get(&file_id)
            .map(|entry| entry.chunks.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_file(&self, filename: &str) -> Result<Option<FileRecord>> {
        let Some(id) = self.names.get(filename).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.files.get(&id).map(|entry| entry.record.clone()))
    }

    async fn delete_file(&self, file_id: i64) -> Result<()> {
        let (_, entry) = self
            .files
            .remove(&file_id)
            .ok_or_else(|| TransferError::NotFound(format!("file id {}", file_id)))?;
        self.names.remove(&entry.record.filename);
        Ok(())
    }
}
