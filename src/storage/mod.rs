//! Node-side Chunk Storage
//!
//! Everything a storage node runs: a content-addressed on-disk store and the
//! gRPC service that exposes it to the coordinator. Chunk placement (which
//! node receives which chunk) also lives here since it is the contract
//! between the two sides.
//!
//! ## Core Concepts
//! - **Content addressing**: A chunk's SHA-256 hex digest is its file name, so identical
//!   content deduplicates within a node and lookups need no file-level knowledge.
//! - **Sessions**: One client-streamed `TransferFile` call per node per upload.
//! - **Placement**: `PlacementPlan` maps chunk index `i` to node `i mod N` over a sorted snapshot.

pub mod disk;
pub mod placement;
pub mod protocol;
pub mod service;
