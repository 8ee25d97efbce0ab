//! Sharded Chunk Storage Library
//!
//! Core of a content-addressed object store split into a coordinator
//! ("transfer service") and a set of storage nodes. Both binaries are thin
//! wiring around the modules below.
//!
//! ## Architecture Modules
//! - **`registry`**: Live storage nodes and their gRPC connections. Nodes
//!   self-register at start; uploads read a point-in-time snapshot.
//! - **`storage`**: Node side. Persists chunks on disk by content hash and
//!   serves them over the `FileTransferService` gRPC contract.
//! - **`metadata`**: System of record for files and chunk placement
//!   (Postgres, or in-memory for development).
//! - **`transfer`**: Upload pipeline (chunk, hash, place, persist, fan out) and
//!   download pipeline (fan in, verify, reassemble in order).
//! - **`app`**: Coordinator wiring (pipelines, router, stats reporter).
//! - **`config`**, **`error`**, **`hashing`**: shared plumbing.

pub mod app;
pub mod config;
pub mod error;
pub mod hashing;
pub mod metadata;
pub mod registry;
pub mod storage;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, TransferError};
