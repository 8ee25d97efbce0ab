//! PostgreSQL metadata backend.
//!
//! Schema lives in `migrations/` and is applied at start-up. `filename` is
//! unique and `(file_id, chunk_number)` is unique, so duplicate names and
//! duplicate indices surface as `Conflict`.

use super::types::{ChunkRecord, FileRecord, MetadataStore};
use crate::error::{Result, TransferError};

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

/// Connection parameters, passed individually so the password never has to
/// be embedded in a URL.
#[derive(Debug, Clone)]
pub struct PgParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl PgParams {
    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

pub struct PgMetadataStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: i64,
    filename: String,
    total_chunks: i32,
    total_size: i64,
}

#[derive(sqlx::FromRow)]
struct ChunkRow {
    file_id: i64,
    chunk_number: i32,
    service_name: String,
    chunk_size: i64,
    chunk_hash: String,
}

impl PgMetadataStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(params: &PgParams) -> Result<Self> {
        tracing::info!(
            host = %params.host,
            port = params.port,
            database = %params.database,
            username = %params.user,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(params.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(params.connect_options())
            .await?;

        Ok(Self { pool })
    }

    /// Keeps trying to connect every `delay` until it succeeds or `attempts` run out.
    pub async fn connect_with_retry(
        params: &PgParams,
        attempts: usize,
        delay: Duration,
    ) -> Result<Self> {
        let attempts = attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match Self::connect(params).await {
                Ok(store) => return Ok(store),
                Err(e) => {
                    tracing::warn!(
                        "Error connecting to database (attempt {}/{}): {}",
                        attempt,
                        attempts,
                        e
                    );
                    last_err = Some(e);
                    if attempt < attempts {
                        tracing::info!("Retrying in {:?}...", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| TransferError::Storage("database connection failed".to_string())))
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| TransferError::Storage(format!("migration failed: {}", e)))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_i32(value: u32, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| TransferError::BadRequest(format!("{} {} out of range", what, value)))
}

fn to_i64(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| TransferError::BadRequest(format!("{} {} out of range", what, value)))
}

fn corrupt(what: &str, value: i64) -> TransferError {
    TransferError::Storage(format!("corrupt {} in database: {}", what, value))
}

impl TryFrom<FileRow> for FileRecord {
    type Error = TransferError;

    fn try_from(row: FileRow) -> Result<Self> {
        Ok(FileRecord {
            id: row.id,
            filename: row.filename,
            total_chunks: u32::try_from(row.total_chunks)
                .map_err(|_| corrupt("total_chunks", row.total_chunks.into()))?,
            total_size: u64::try_from(row.total_size)
                .map_err(|_| corrupt("total_size", row.total_size))?,
        })
    }
}

impl TryFrom<ChunkRow> for ChunkRecord {
    type Error = TransferError;

    fn try_from(row: ChunkRow) -> Result<Self> {
        Ok(ChunkRecord {
            file_id: row.file_id,
            chunk_number: u32::try_from(row.chunk_number)
                .map_err(|_| corrupt("chunk_number", row.chunk_number.into()))?,
            service_name: row.service_name,
            chunk_size: u64::try_from(row.chunk_size)
                .map_err(|_| corrupt("chunk_size", row.chunk_size))?,
            chunk_hash: row.chunk_hash,
        })
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn create_file(
        &self,
        filename: &str,
        total_chunks: u32,
        total_size: u64,
    ) -> Result<FileRecord> {
        let row = sqlx::query_as::<_, FileRow>(
            "INSERT INTO files (filename, total_chunks, total_size)
             VALUES ($1, $2, $3)
             RETURNING id, filename, total_chunks, total_size",
        )
        .bind(filename)
        .bind(to_i32(total_chunks, "total_chunks")?)
        .bind(to_i64(total_size, "total_size")?)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update_file(&self, file_id: i64, total_chunks: u32, total_size: u64) -> Result<()> {
        let result = sqlx::query("UPDATE files SET total_chunks = $1, total_size = $2 WHERE id = $3")
            .bind(to_i32(total_chunks, "total_chunks")?)
            .bind(to_i64(total_size, "total_size")?)
            .bind(file_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TransferError::NotFound(format!("file id {}", file_id)));
        }
        Ok(())
    }

    async fn insert_chunk(&self, chunk: &ChunkRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO chunks (file_id, chunk_number, service_name, chunk_size, chunk_hash)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(chunk.file_id)
        .bind(to_i32(chunk.chunk_number, "chunk_number")?)
        .bind(&chunk.service_name)
        .bind(to_i64(chunk.chunk_size, "chunk_size")?)
        .bind(&chunk.chunk_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_chunks(&self, file_id: i64) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query_as::<_, ChunkRow>(
            "SELECT file_id, chunk_number, service_name, chunk_size, chunk_hash
             FROM chunks WHERE file_id = $1 ORDER BY chunk_number ASC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChunkRecord::try_from).collect()
    }

    async fn find_file(&self, filename: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT id, filename, total_chunks, total_size FROM files WHERE filename = $1",
        )
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::try_from).transpose()
    }

    async fn delete_file(&self, file_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(TransferError::NotFound(format!("file id {}", file_id)));
        }

        tx.commit().await?;
        Ok(())
    }
}
