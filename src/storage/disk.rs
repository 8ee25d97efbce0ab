use crate::error::{Result, TransferError};
use crate::hashing::{chunk_hash, is_valid_hash};

use super::protocol::FILES_DIR;

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Content-addressed chunk storage on local disk.
///
/// Layout: `<storage_dir>/files/<service_name>/<hash>`, no extension.
/// The store knows nothing about files, only chunks.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Opens (and creates if missing) the namespace of `service_name` under `storage_dir`.
    pub async fn open(storage_dir: impl AsRef<Path>, service_name: &str) -> Result<Self> {
        if service_name.is_empty() || service_name.contains(['/', '\\']) || service_name == ".." {
            return Err(TransferError::BadRequest(format!(
                "invalid service name: {:?}",
                service_name
            )));
        }
        let root = storage_dir.as_ref().join(FILES_DIR).join(service_name);
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_path(&self, hash: &str) -> Result<PathBuf> {
        if !is_valid_hash(hash) {
            return Err(TransferError::BadRequest(format!("invalid chunk hash: {:?}", hash)));
        }
        Ok(self.root.join(hash))
    }

    /// Stores `data` under `hash`.
    ///
    /// Returns `false` when a payload with that hash already exists; it is left
    /// untouched. A payload that does not hash to `hash` is refused.
    pub async fn put(&self, hash: &str, data: &[u8]) -> Result<bool> {
        let path = self.chunk_path(hash)?;

        let actual = chunk_hash(data);
        if actual != hash {
            return Err(TransferError::BadRequest(format!(
                "payload hashes to {} but was sent as {}",
                actual, hash
            )));
        }

        if fs::try_exists(&path).await? {
            return Ok(false);
        }

        fs::create_dir_all(&self.root).await?;

        // Write-then-rename so readers never observe a partial chunk.
        let tmp = self
            .root
            .join(format!("{}.tmp.{:016x}", hash, rand::random::<u64>()));
        let mut file = fs::File::create(&tmp).await?;
        if let Err(e) = write_all_synced(&mut file, data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        drop(file);
        fs::rename(&tmp, &path).await?;

        Ok(true)
    }

    pub async fn get(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.chunk_path(hash)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TransferError::NotFound(format!("chunk {}", hash)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn contains(&self, hash: &str) -> Result<bool> {
        let path = self.chunk_path(hash)?;
        Ok(fs::try_exists(&path).await?)
    }
}

async fn write_all_synced(file: &mut fs::File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.sync_all().await
}
