//! Metadata Module Tests
//!
//! Exercises the `MetadataStore` contract.
//!
//! ## Test Scopes
//! - **MemoryMetadataStore**: Always runs.
//! - **PgMetadataStore**: Runs against a live database only when `DATABASE_URL` is set.

#[cfg(test)]
mod tests {
    use crate::error::TransferError;
    use crate::metadata::memory::MemoryMetadataStore;
    use crate::metadata::postgres::PgMetadataStore;
    use crate::metadata::{ChunkRecord, MetadataStore};
    use std::sync::Arc;

    fn chunk(file_id: i64, index: u32, node: &str) -> ChunkRecord {
        ChunkRecord {
            file_id,
            chunk_number: index,
            service_name: node.to_string(),
            chunk_size: 4,
            chunk_hash: format!("{:064x}", index),
        }
    }

    /// The contract every backend has to satisfy.
    async fn exercise_store(store: &dyn MetadataStore, filename: &str) {
        // Create, then look up by name
        let file = store.create_file(filename, 0, 0).await.unwrap();
        assert_eq!(file.filename, filename);
        assert_eq!(file.total_chunks, 0);

        let found = store.find_file(filename).await.unwrap().unwrap();
        assert_eq!(found.id, file.id);

        // Duplicate names are refused
        let dup = store.create_file(filename, 0, 0).await;
        assert!(matches!(dup, Err(TransferError::Conflict(_))));

        // Chunks come back ordered by index regardless of insert order
        for index in [2, 0, 1] {
            store.insert_chunk(&chunk(file.id, index, "node-a")).await.unwrap();
        }
        let chunks = store.list_chunks(file.id).await.unwrap();
        let indices: Vec<u32> = chunks.iter().map(|c| c.chunk_number).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        // One record per index
        let dup = store.insert_chunk(&chunk(file.id, 1, "node-b")).await;
        assert!(matches!(dup, Err(TransferError::Conflict(_))));
        let chunks = store.list_chunks(file.id).await.unwrap();
        assert_eq!(chunks[1].service_name, "node-a");

        // Final counts
        store.update_file(file.id, 3, 12).await.unwrap();
        let updated = store.find_file(filename).await.unwrap().unwrap();
        assert_eq!(updated.total_chunks, 3);
        assert_eq!(updated.total_size, 12);

        // Delete removes file and chunks together
        store.delete_file(file.id).await.unwrap();
        assert!(store.find_file(filename).await.unwrap().is_none());
        assert!(store.list_chunks(file.id).await.unwrap().is_empty());

        // And frees the name
        let again = store.create_file(filename, 0, 0).await.unwrap();
        store.delete_file(again.id).await.unwrap();
    }

    // ============================================================
    // IN-MEMORY BACKEND
    // ============================================================

    #[tokio::test]
    async fn test_memory_store_contract() {
        let store = MemoryMetadataStore::new();
        exercise_store(&store, "report.pdf").await;
        assert_eq!(store.file_count(), 0);
        assert_eq!(store.chunk_count(), 0);
    }

    #[tokio::test]
    async fn test_memory_unknown_ids_are_not_found() {
        let store = MemoryMetadataStore::new();

        assert!(matches!(
            store.update_file(42, 1, 1).await,
            Err(TransferError::NotFound(_))
        ));
        assert!(matches!(
            store.insert_chunk(&chunk(42, 0, "node-a")).await,
            Err(TransferError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_file(42).await,
            Err(TransferError::NotFound(_))
        ));
        assert!(store.list_chunks(42).await.unwrap().is_empty());
        assert!(store.find_file("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_concurrent_uploads_do_not_interfere() {
        let store = Arc::new(MemoryMetadataStore::new());

        let mut handles = Vec::new();
        for f in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let file = store
                    .create_file(&format!("file-{}", f), 0, 0)
                    .await
                    .unwrap();
                for i in 0..50 {
                    store.insert_chunk(&chunk(file.id, i, "node-a")).await.unwrap();
                }
                file.id
            }));
        }

        for handle in handles {
            let id = handle.await.unwrap();
            assert_eq!(store.list_chunks(id).await.unwrap().len(), 50);
        }
        assert_eq!(store.file_count(), 8);
        assert_eq!(store.chunk_count(), 400);
    }

    #[tokio::test]
    async fn test_memory_concurrent_create_same_name_single_winner() {
        let store = Arc::new(MemoryMetadataStore::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create_file("contested.bin", 0, 0).await.is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    // ============================================================
    // POSTGRES BACKEND (requires DATABASE_URL)
    // ============================================================

    #[tokio::test]
    async fn test_postgres_store_contract() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping postgres test");
            return;
        };

        let pool = sqlx::PgPool::connect(&url).await.unwrap();
        let store = PgMetadataStore::from_pool(pool);
        store.migrate().await.unwrap();

        let filename = format!("pg-test-{:016x}.bin", rand::random::<u64>());
        exercise_store(&store, &filename).await;
        store.close().await;
    }
}
