//! Metadata Store
//!
//! System of record for uploaded files and the placement of their chunks.
//! The set of chunk records of a file, ordered by index, is the plan used to
//! rebuild it: where each chunk lives and which hash it must match.
//!
//! Two backends implement [`MetadataStore`]:
//! - **`postgres`**: SQLx over PostgreSQL, the production backend.
//! - **`memory`**: sharded in-process maps, for development and tests.
//!
//! Neither adds an application-wide lock; each relies on its own concurrency control.

pub mod memory;
pub mod postgres;
pub mod types;

pub use types::{ChunkRecord, FileRecord, MetadataStore};

#[cfg(test)]
mod tests;
