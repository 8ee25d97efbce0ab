use crate::metadata::{ChunkRecord, FileRecord};
use serde::{Deserialize, Serialize};

pub const ENDPOINT_UPLOAD: &str = "/upload";
pub const ENDPOINT_DOWNLOAD: &str = "/download";
pub const ENDPOINT_FILES: &str = "/files";

/// Multipart field carrying the file body.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadQuery {
    pub filename: String,
}

/// Body of `GET /files/:filename`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfoResponse {
    pub file: FileRecord,
    pub chunks: Vec<ChunkRecord>,
}
