use super::disk::ChunkStore;
use super::protocol::{
    ChunkRequest, ChunkResponse, FileChunk, FileTransferService, FileTransferServiceServer,
    MAX_MESSAGE_SIZE, TRANSFER_OK, TransferResponse,
};

use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};

/// gRPC front of a node's [`ChunkStore`].
#[derive(Clone)]
pub struct ChunkStoreService {
    store: Arc<ChunkStore>,
    service_name: String,
}

impl ChunkStoreService {
    pub fn new(store: Arc<ChunkStore>, service_name: impl Into<String>) -> Self {
        Self {
            store,
            service_name: service_name.into(),
        }
    }

    pub fn into_server(self) -> FileTransferServiceServer<Self> {
        FileTransferServiceServer::new(self)
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_MESSAGE_SIZE)
    }
}

#[tonic::async_trait]
impl FileTransferService for ChunkStoreService {
    async fn transfer_file(
        &self,
        request: Request<Streaming<FileChunk>>,
    ) -> Result<Response<TransferResponse>, Status> {
        let mut stream = request.into_inner();
        let mut received = 0usize;

        // Chunks written before a failure stay on disk; storage is chunk-granular.
        while let Some(chunk) = stream.message().await? {
            let created = self
                .store
                .put(&chunk.chunk_hash, &chunk.chunk)
                .await
                .map_err(|e| {
                    tracing::error!(
                        node = %self.service_name,
                        file = %chunk.filename,
                        chunk = chunk.chunk_number,
                        "Failed to store chunk: {}",
                        e
                    );
                    Status::from(e)
                })?;

            tracing::debug!(
                node = %self.service_name,
                file = %chunk.filename,
                chunk = chunk.chunk_number,
                total = chunk.total_chunks,
                deduplicated = !created,
                "Stored chunk {}",
                chunk.chunk_hash
            );
            received += 1;
        }

        tracing::info!(
            node = %self.service_name,
            "Transfer session closed after {} chunk(s)",
            received
        );

        Ok(Response::new(TransferResponse {
            status: TRANSFER_OK.to_string(),
        }))
    }

    async fn get_chunk(
        &self,
        request: Request<ChunkRequest>,
    ) -> Result<Response<ChunkResponse>, Status> {
        let req = request.into_inner();

        // filename and chunk_number are informational; the hash is the key.
        match self.store.get(&req.chunk_hash).await {
            Ok(chunk) => {
                tracing::debug!(
                    node = %self.service_name,
                    file = %req.filename,
                    chunk = req.chunk_number,
                    "Serving chunk {} ({} bytes)",
                    req.chunk_hash,
                    chunk.len()
                );
                Ok(Response::new(ChunkResponse { chunk }))
            }
            Err(e) => {
                tracing::warn!(
                    node = %self.service_name,
                    file = %req.filename,
                    chunk = req.chunk_number,
                    "GetChunk failed: {}",
                    e
                );
                Err(e.into())
            }
        }
    }
}

/// Serves the chunk store on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    service: ChunkStoreService,
    shutdown: impl Future<Output = ()>,
) -> Result<(), tonic::transport::Error> {
    Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
}
