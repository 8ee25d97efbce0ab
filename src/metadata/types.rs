use crate::error::Result;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub filename: String,
    /// Declared at creation (0 if unknown), final once the upload has read the whole stream.
    pub total_chunks: u32,
    pub total_size: u64,
}

/// Placement of one chunk. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub file_id: i64,
    pub chunk_number: u32,
    pub service_name: String,
    pub chunk_size: u64,
    pub chunk_hash: String,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Creates a file record. `Conflict` if the name is taken.
    async fn create_file(&self, filename: &str, total_chunks: u32, total_size: u64)
    -> Result<FileRecord>;

    /// Sets the final chunk count and size. `NotFound` if the record is gone.
    async fn update_file(&self, file_id: i64, total_chunks: u32, total_size: u64) -> Result<()>;

    /// Adds a chunk record. `Conflict` if the index is already recorded for the file.
    async fn insert_chunk(&self, chunk: &ChunkRecord) -> Result<()>;

    /// Chunk records of a file, ascending by index.
    async fn list_chunks(&self, file_id: i64) -> Result<Vec<ChunkRecord>>;

    async fn find_file(&self, filename: &str) -> Result<Option<FileRecord>>;

    /// Removes a file record and all of its chunk records together.
    async fn delete_file(&self, file_id: i64) -> Result<()>;
}
