//! Download Pipeline
//!
//! Fetches every chunk of a file concurrently, one task per chunk, verifies
//! each against its recorded hash, and only then hands the bytes out in
//! index order. Nothing is emitted unless every chunk verified.

use crate::error::{Result, TransferError};
use crate::hashing::chunk_hash;
use crate::metadata::{ChunkRecord, FileRecord, MetadataStore};
use crate::registry::service::{NodeClient, NodeRegistry};
use crate::storage::protocol::ChunkRequest;

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;

pub struct DownloadPipeline {
    registry: Arc<NodeRegistry>,
    metadata: Arc<dyn MetadataStore>,
    fetch_timeout: Duration,
}

impl DownloadPipeline {
    pub fn new(
        registry: Arc<NodeRegistry>,
        metadata: Arc<dyn MetadataStore>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            metadata,
            fetch_timeout,
        }
    }

    /// Resolves `filename` into its verified chunks, in index order.
    pub async fn fetch_verified(&self, filename: &str) -> Result<(FileRecord, Vec<Bytes>)> {
        let file = self
            .metadata
            .find_file(filename)
            .await?
            .ok_or_else(|| TransferError::NotFound(format!("file {}", filename)))?;

        let records = self.metadata.list_chunks(file.id).await?;
        if file.total_chunks == 0 && records.is_empty() {
            return Ok((file, Vec::new()));
        }
        if records.is_empty() {
            return Err(TransferError::NotFound(format!("no chunks recorded for {}", filename)));
        }
        // Counts disagree while an upload is still running or after one died mid-stream.
        if records.len() != file.total_chunks as usize {
            return Err(TransferError::NotFound(format!(
                "file {} is incomplete: {} chunk records for {} chunks",
                filename,
                records.len(),
                file.total_chunks
            )));
        }
        let mut by_index: HashMap<u32, ChunkRecord> =
            records.into_iter().map(|r| (r.chunk_number, r)).collect();

        let connections = self.registry.connections();
        let total = file.total_chunks as usize;
        let mut slots: Vec<Option<Result<Bytes>>> = (0..total).map(|_| None).collect();
        let mut fetches = JoinSet::new();

        for index in 0..file.total_chunks {
            let Some(record) = by_index.remove(&index) else {
                slots[index as usize] = Some(Err(TransferError::NotFound(format!(
                    "chunk {} of {} has no record",
                    index, filename
                ))));
                continue;
            };
            let Some(client) = connections.get(&record.service_name).cloned() else {
                slots[index as usize] = Some(Err(TransferError::Unavailable(format!(
                    "chunk {}: node {} is not registered",
                    index, record.service_name
                ))));
                continue;
            };

            let filename = filename.to_string();
            let timeout = self.fetch_timeout;
            fetches.spawn(async move {
                let outcome = fetch_chunk(client, &filename, &record, timeout).await;
                (index, outcome)
            });
        }

        // Wait for every fetch so no result is left unresolved.
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index as usize] = Some(outcome),
                Err(e) => tracing::error!(file = %filename, "Chunk fetch task failed: {}", e),
            }
        }

        let mut chunks = Vec::with_capacity(total);
        let mut first_err = None;
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(data)) => chunks.push(data),
                Some(Err(e)) => {
                    tracing::error!(file = %filename, chunk = index, "Download failed: {}", e);
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                None => {
                    if first_err.is_none() {
                        first_err = Some(TransferError::Storage(format!(
                            "chunk {} fetch was aborted",
                            index
                        )));
                    }
                }
            }
        }
        if let Some(err) = first_err {
            return Err(err);
        }

        tracing::info!(
            file = %filename,
            "Download verified. Total chunks: {}, total size: {} bytes",
            file.total_chunks,
            file.total_size
        );
        Ok((file, chunks))
    }

    /// Writes the whole verified file to `out`. On error nothing has been written.
    pub async fn download<W>(&self, filename: &str, out: &mut W) -> Result<FileRecord>
    where
        W: AsyncWrite + Unpin,
    {
        let (file, chunks) = self.fetch_verified(filename).await?;
        for chunk in &chunks {
            out.write_all(chunk).await?;
        }
        out.flush().await?;
        Ok(file)
    }
}

async fn fetch_chunk(
    mut client: NodeClient,
    filename: &str,
    record: &ChunkRecord,
    timeout: Duration,
) -> Result<Bytes> {
    let node = record.service_name.as_str();
    let request = ChunkRequest {
        filename: filename.to_string(),
        chunk_number: record.chunk_number as i32,
        chunk_hash: record.chunk_hash.clone(),
    };

    let response = match tokio::time::timeout(timeout, client.get_chunk(request)).await {
        Ok(Ok(resp)) => resp.into_inner(),
        Ok(Err(status)) => {
            return Err(match TransferError::from_status(node, status) {
                TransferError::NotFound(msg) => {
                    TransferError::NotFound(format!("chunk {}: {}", record.chunk_number, msg))
                }
                TransferError::Upstream { node, message } => TransferError::Upstream {
                    node,
                    message: format!("chunk {}: {}", record.chunk_number, message),
                },
                other => other,
            });
        }
        Err(_) => {
            return Err(TransferError::upstream(
                node,
                format!("chunk {}: fetch timed out after {:?}", record.chunk_number, timeout),
            ));
        }
    };

    let actual = chunk_hash(&response.chunk);
    if actual != record.chunk_hash {
        return Err(TransferError::IntegrityMismatch {
            index: record.chunk_number,
            expected: record.chunk_hash.clone(),
            actual,
        });
    }

    tracing::debug!(node = %node, chunk = record.chunk_number, "Fetched chunk");
    Ok(Bytes::from(response.chunk))
}
