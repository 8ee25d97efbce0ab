//! Transfer Pipelines
//!
//! Everything the coordinator does with file bytes.
//!
//! ## Core Mechanisms
//! - **Upload**: Split the stream into fixed-size chunks, hash each one, place chunk `i`
//!   on node `i mod N` of a registry snapshot, record placement, then open one
//!   client-streaming session per node and wait for all of them.
//! - **Download**: One fetch per chunk, all concurrent. Every chunk is checked against
//!   its recorded hash; bytes are released in index order only after all of them pass.
//! - **Failure model**: No retries and no re-placement. Upload metadata written before a
//!   failed transfer is kept; `DELETE /files/:filename` clears it.

pub mod download;
pub mod handlers;
pub mod protocol;
pub mod upload;
