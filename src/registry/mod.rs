//! Node Registry
//!
//! Tracks which storage nodes exist and holds one gRPC connection per node.
//!
//! ## Core Mechanisms
//! - **Self-registration**: Nodes call `POST /register` on the coordinator at start-up.
//!   The coordinator dials the advertised address (bounded timeout) before accepting.
//! - **Uniqueness**: Service names are unique keys. A second registration under a taken
//!   name is a conflict; the first entry is never overwritten and nothing is ever removed.
//! - **Snapshots**: Readers copy what they need out of the lock. No lock is held across
//!   a network call.

pub mod client;
pub mod handlers;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;
