//! Chunk Transfer Protocol
//!
//! Generated gRPC types for the coordinator/node contract in
//! `proto/file_transfer.proto`, plus the limits both sides agree on.
//!
//! - `TransferFile`: client-streamed `FileChunk`s, one `TransferResponse` after the stream closes.
//! - `GetChunk`: unary `ChunkRequest` -> `ChunkResponse`. `chunk_hash` is the only lookup key.

pub mod proto {
    tonic::include_proto!("filetransfer");
}

pub use proto::file_transfer_service_client::FileTransferServiceClient;
pub use proto::file_transfer_service_server::{FileTransferService, FileTransferServiceServer};
pub use proto::{ChunkRequest, ChunkResponse, FileChunk, TransferResponse};

/// Directory under the storage root that holds per-node chunk namespaces.
pub const FILES_DIR: &str = "files";

/// gRPC message size cap applied on both ends of the connection.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Largest chunk size that still fits a `FileChunk` under `MAX_MESSAGE_SIZE`.
pub const MAX_CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// Acknowledgement text returned when a transfer session closes cleanly.
pub const TRANSFER_OK: &str = "File successfully received";
