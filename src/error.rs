//! Error Types
//!
//! One enum covers every failure the pipelines, the registry and the stores can
//! report. It maps to an HTTP response on the coordinator and to a
//! `tonic::Status` on the storage nodes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransferError>;

#[derive(Error, Debug)]
pub enum TransferError {
    /// A node name is already registered, or a file name / chunk index already exists (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// No nodes registered, or a chunk's node is gone (503).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Unknown file, missing chunk metadata or missing chunk payload (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Recomputed hash differs from the recorded one (500).
    #[error("integrity mismatch for chunk {index}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        index: u32,
        expected: String,
        actual: String,
    },

    /// Network or RPC failure talking to a node (502).
    #[error("node {node}: {message}")]
    Upstream { node: String, message: String },

    /// Local disk or metadata store failure (500).
    #[error("storage error: {0}")]
    Storage(String),

    /// Malformed client input (400).
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl TransferError {
    pub fn upstream(node: impl Into<String>, message: impl ToString) -> Self {
        Self::Upstream {
            node: node.into(),
            message: message.to_string(),
        }
    }

    /// Classifies a status returned by a node.
    pub fn from_status(node: &str, status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::NotFound => {
                Self::NotFound(format!("node {}: {}", node, status.message()))
            }
            _ => Self::upstream(node, format!("{:?}: {}", status.code(), status.message())),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::IntegrityMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for TransferError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

impl From<TransferError> for tonic::Status {
    fn from(err: TransferError) -> Self {
        let message = err.to_string();
        match err {
            TransferError::NotFound(_) => tonic::Status::not_found(message),
            TransferError::BadRequest(_) | TransferError::IntegrityMismatch { .. } => {
                tonic::Status::invalid_argument(message)
            }
            TransferError::Conflict(_) => tonic::Status::already_exists(message),
            TransferError::Unavailable(_) => tonic::Status::unavailable(message),
            TransferError::Upstream { .. } | TransferError::Storage(_) => {
                tonic::Status::internal(message)
            }
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            _ => Self::Storage(err.to_string()),
        }
    }
}
