//! Upload Pipeline
//!
//! Reads a byte stream in fixed-size chunks, hashes and places each chunk,
//! records the placement, then ships every node its chunks over one
//! transfer session per node, all sessions running concurrently.
//!
//! Metadata is written before any byte leaves the coordinator, so a node
//! never holds data the metadata store does not know about. The converse
//! does not hold: a failed session leaves records for undelivered chunks.
//! A read or metadata failure before any session opens removes the file's
//! records instead.

use crate::error::{Result, TransferError};
use crate::hashing::chunk_hash;
use crate::metadata::{ChunkRecord, MetadataStore};
use crate::registry::service::{NodeClient, NodeRegistry};
use crate::storage::placement::PlacementPlan;
use crate::storage::protocol::{FileChunk, MAX_CHUNK_SIZE};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinSet;

/// Outcome of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub file_id: i64,
    pub filename: String,
    pub total_chunks: u32,
    pub total_size: u64,
    /// Chunk indices each node received, in send order.
    pub placement: BTreeMap<String, Vec<u32>>,
}

struct PendingChunk {
    index: u32,
    hash: String,
    data: Vec<u8>,
}

pub struct UploadPipeline {
    registry: Arc<NodeRegistry>,
    metadata: Arc<dyn MetadataStore>,
    chunk_size: usize,
    session_timeout: Duration,
}

impl UploadPipeline {
    pub fn new(
        registry: Arc<NodeRegistry>,
        metadata: Arc<dyn MetadataStore>,
        chunk_size: usize,
        session_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            metadata,
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
            session_timeout,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Uploads `reader` as `filename`. `declared_len`, when known, only seeds
    /// the initial file record and progress logging; it may overestimate.
    ///
    /// A failure before the final counts are recorded removes the file record
    /// and its chunk records. A failed transfer session keeps them.
    pub async fn upload<R>(
        &self,
        filename: &str,
        mut reader: R,
        declared_len: Option<u64>,
    ) -> Result<UploadSummary>
    where
        R: AsyncRead + Unpin,
    {
        if filename.trim().is_empty() {
            return Err(TransferError::BadRequest("filename is empty".to_string()));
        }

        // One snapshot for the whole upload: every chunk sees the same node set.
        let connections = self.registry.connections();
        let plan = PlacementPlan::new(connections.keys().cloned().collect());
        if plan.is_empty() {
            return Err(TransferError::Unavailable("no storage nodes registered".to_string()));
        }

        if self.metadata.find_file(filename).await?.is_some() {
            return Err(TransferError::Conflict(format!("file {} already exists", filename)));
        }

        let declared_chunks = declared_len
            .map(|len| len.div_ceil(self.chunk_size as u64))
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0);
        let file = self.metadata.create_file(filename, declared_chunks, 0).await?;

        tracing::info!(
            file = %filename,
            nodes = plan.len(),
            "Started uploading file{}",
            declared_len.map(|l| format!(" with size {} bytes", l)).unwrap_or_default()
        );

        // Until the final counts are written the record describes an unfinished
        // file; drop it rather than leave something a download could resolve.
        let (batches, index, total_size) =
            match self.record_chunks(file.id, filename, &mut reader, &plan, declared_chunks).await {
                Ok(recorded) => recorded,
                Err(err) => {
                    if let Err(cleanup) = self.metadata.delete_file(file.id).await {
                        tracing::warn!(file = %filename, "Failed to drop aborted upload: {}", cleanup);
                    }
                    tracing::error!(file = %filename, "Upload aborted before transfer: {}", err);
                    return Err(err);
                }
            };

        let placement: BTreeMap<String, Vec<u32>> = batches
            .iter()
            .map(|(node, chunks)| (node.clone(), chunks.iter().map(|c| c.index).collect()))
            .collect();

        self.distribute(filename, index, batches, &connections).await?;

        tracing::info!(
            file = %filename,
            "Upload completed. Total chunks: {}, total size: {} bytes",
            index,
            total_size
        );

        Ok(UploadSummary {
            file_id: file.id,
            filename: filename.to_string(),
            total_chunks: index,
            total_size,
            placement,
        })
    }

    /// Reads, hashes, places and records every chunk, then writes the final counts.
    async fn record_chunks<R>(
        &self,
        file_id: i64,
        filename: &str,
        reader: &mut R,
        plan: &PlacementPlan,
        declared_chunks: u32,
    ) -> Result<(BTreeMap<String, Vec<PendingChunk>>, u32, u64)>
    where
        R: AsyncRead + Unpin,
    {
        let mut batches: BTreeMap<String, Vec<PendingChunk>> = BTreeMap::new();
        let mut index: u32 = 0;
        let mut total_size: u64 = 0;

        while let Some(data) = read_chunk(reader, self.chunk_size).await? {
            let node = plan
                .node_for(index)
                .ok_or_else(|| TransferError::Unavailable("no storage nodes registered".to_string()))?
                .to_string();
            let hash = chunk_hash(&data);

            self.metadata
                .insert_chunk(&ChunkRecord {
                    file_id,
                    chunk_number: index,
                    service_name: node.clone(),
                    chunk_size: data.len() as u64,
                    chunk_hash: hash.clone(),
                })
                .await?;

            total_size += data.len() as u64;
            batches.entry(node).or_default().push(PendingChunk { index, hash, data });

            index = index.checked_add(1).ok_or_else(|| {
                TransferError::BadRequest("file has too many chunks".to_string())
            })?;

            if declared_chunks > 0 {
                let percent = f64::from(index) / f64::from(declared_chunks) * 100.0;
                tracing::debug!(file = %filename, "Chunked {}/{} ({:.2}%)", index, declared_chunks, percent);
            } else {
                tracing::debug!(file = %filename, "Chunked {}", index);
            }
        }

        self.metadata.update_file(file_id, index, total_size).await?;
        Ok((batches, index, total_size))
    }

    /// One session per node, all concurrent; waits for every session before reporting.
    async fn distribute(
        &self,
        filename: &str,
        total_chunks: u32,
        batches: BTreeMap<String, Vec<PendingChunk>>,
        connections: &HashMap<String, NodeClient>,
    ) -> Result<()> {
        let nodes: Vec<String> = batches.keys().cloned().collect();
        let mut results: Vec<Option<Result<()>>> = (0..nodes.len()).map(|_| None).collect();
        let mut sessions = JoinSet::new();

        for (slot, (node, chunks)) in batches.into_iter().enumerate() {
            let Some(client) = connections.get(&node).cloned() else {
                results[slot] = Some(Err(TransferError::Unavailable(format!(
                    "node {} is no longer registered",
                    node
                ))));
                continue;
            };

            let messages = chunks
                .into_iter()
                .map(|chunk| FileChunk {
                    filename: filename.to_string(),
                    chunk: chunk.data,
                    chunk_number: chunk.index as i32,
                    total_chunks: total_chunks as i32,
                    chunk_hash: chunk.hash,
                    service_name: node.clone(),
                })
                .collect::<Vec<_>>();

            let timeout = self.session_timeout;
            sessions.spawn(async move {
                let outcome = send_session(client, &node, messages, timeout).await;
                (slot, outcome)
            });
        }

        while let Some(joined) = sessions.join_next().await {
            match joined {
                Ok((slot, outcome)) => results[slot] = Some(outcome),
                Err(e) => tracing::error!("Transfer session task failed: {}", e),
            }
        }

        let mut failures = Vec::new();
        for (node, result) in nodes.iter().zip(results) {
            match result {
                Some(Ok(())) => {}
                Some(Err(e)) => failures.push((node.clone(), e)),
                None => failures.push((
                    node.clone(),
                    TransferError::upstream(node.clone(), "transfer session aborted"),
                )),
            }
        }

        match failures.len() {
            0 => Ok(()),
            1 => {
                let (node, err) = failures.remove(0);
                tracing::error!(file = %filename, node = %node, "Error sending chunks: {}", err);
                Err(err)
            }
            _ => {
                for (node, err) in &failures {
                    tracing::error!(file = %filename, node = %node, "Error sending chunks: {}", err);
                }
                let names: Vec<&str> = failures.iter().map(|(n, _)| n.as_str()).collect();
                let reasons: Vec<String> = failures.iter().map(|(_, e)| e.to_string()).collect();
                Err(TransferError::Upstream {
                    node: names.join(", "),
                    message: reasons.join("; "),
                })
            }
        }
    }
}

async fn send_session(
    mut client: NodeClient,
    node: &str,
    messages: Vec<FileChunk>,
    timeout: Duration,
) -> Result<()> {
    let count = messages.len();
    let call = client.transfer_file(tokio_stream::iter(messages));

    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(ack)) => {
            tracing::debug!(node = %node, "Session acknowledged {} chunk(s): {}", count, ack.into_inner().status);
            Ok(())
        }
        Ok(Err(status)) => Err(TransferError::upstream(
            node,
            format!("transfer failed: {:?}: {}", status.code(), status.message()),
        )),
        Err(_) => Err(TransferError::upstream(
            node,
            format!("transfer session timed out after {:?}", timeout),
        )),
    }
}

/// Fills up to `chunk_size` bytes. `None` once the reader is exhausted.
async fn read_chunk<R>(reader: &mut R, chunk_size: usize) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size];
    let mut filled = 0;

    while filled < chunk_size {
        let n = reader.read(&mut buf[filled..]).await.map_err(|e| {
            TransferError::BadRequest(format!("error reading upload stream: {}", e))
        })?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled == 0 {
        return Ok(None);
    }
    buf.truncate(filled);
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_chunk_splits_exactly() {
        let data = b"hello world";
        let mut reader: &[u8] = data;

        let mut chunks = Vec::new();
        while let Some(chunk) = read_chunk(&mut reader, 4).await.unwrap() {
            chunks.push(chunk);
        }
        assert_eq!(chunks, vec![b"hell".to_vec(), b"o wo".to_vec(), b"rld".to_vec()]);
    }

    #[tokio::test]
    async fn test_read_chunk_exact_multiple() {
        let data = b"0123456789";
        let mut reader: &[u8] = data;

        let mut chunks = Vec::new();
        while let Some(chunk) = read_chunk(&mut reader, 5).await.unwrap() {
            chunks.push(chunk);
        }
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn test_read_chunk_empty_stream() {
        let mut reader: &[u8] = b"";
        assert!(read_chunk(&mut reader, 8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_chunk_fills_across_short_reads() {
        // A chained reader yields at most one segment per read call.
        let reader = tokio::io::AsyncReadExt::chain(&b"ab"[..], &b"cdef"[..]);
        let mut reader = Box::pin(reader);
        let chunk = read_chunk(&mut reader, 5).await.unwrap().unwrap();
        assert_eq!(chunk, b"abcde");
    }
}
