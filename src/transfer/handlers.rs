use super::download::DownloadPipeline;
use super::protocol::{DownloadQuery, FileInfoResponse, UPLOAD_FIELD};
use super::upload::UploadPipeline;
use crate::error::{Result, TransferError};
use crate::metadata::MetadataStore;

use axum::body::Body;
use axum::extract::{Extension, Multipart, Path, Query};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::TryStreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::io::StreamReader;

pub async fn handle_upload(
    Extension(pipeline): Extension<Arc<UploadPipeline>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, String)> {
    let declared_len = declared_length(&headers);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TransferError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| TransferError::BadRequest("upload part has no filename".to_string()))?;

        let reader = StreamReader::new(field.map_err(std::io::Error::other));
        tokio::pin!(reader);

        let summary = pipeline.upload(&filename, reader, declared_len).await?;
        return Ok((
            StatusCode::OK,
            format!(
                "File {} uploaded successfully ({} chunks, {} bytes)",
                summary.filename, summary.total_chunks, summary.total_size
            ),
        ));
    }

    Err(TransferError::BadRequest(format!(
        "missing multipart field {:?}",
        UPLOAD_FIELD
    )))
}

/// Request body length, multipart framing included. An upper bound on the
/// file size, good enough to seed progress reporting.
pub fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|len| *len > 0)
}

pub async fn handle_download(
    Extension(pipeline): Extension<Arc<DownloadPipeline>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    if query.filename.trim().is_empty() {
        return Err(TransferError::BadRequest("filename is empty".to_string()));
    }

    // Every chunk is verified before the first byte goes out.
    let (file, chunks) = pipeline.fetch_verified(&query.filename).await?;

    let body = Body::from_stream(tokio_stream::iter(
        chunks.into_iter().map(Ok::<_, Infallible>),
    ));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", attachment_name(&file.filename)),
            ),
            (header::CONTENT_LENGTH, file.total_size.to_string()),
        ],
        body,
    )
        .into_response())
}

pub async fn handle_file_info(
    Extension(metadata): Extension<Arc<dyn MetadataStore>>,
    Path(filename): Path<String>,
) -> Result<Json<FileInfoResponse>> {
    let file = metadata
        .find_file(&filename)
        .await?
        .ok_or_else(|| TransferError::NotFound(format!("file {}", filename)))?;
    let chunks = metadata.list_chunks(file.id).await?;

    Ok(Json(FileInfoResponse { file, chunks }))
}

/// Drops the file and chunk records. Node payloads stay: they are keyed by
/// content and may back other files.
pub async fn handle_delete_file(
    Extension(metadata): Extension<Arc<dyn MetadataStore>>,
    Path(filename): Path<String>,
) -> Result<(StatusCode, String)> {
    let file = metadata
        .find_file(&filename)
        .await?
        .ok_or_else(|| TransferError::NotFound(format!("file {}", filename)))?;
    metadata.delete_file(file.id).await?;

    tracing::info!(file = %filename, "Deleted file metadata");
    Ok((StatusCode::OK, format!("File {} deleted", filename)))
}

/// ASCII base name without quotes, backslashes or control characters, safe
/// inside a quoted `Content-Disposition` parameter.
pub fn attachment_name(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}
