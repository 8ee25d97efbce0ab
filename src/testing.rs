//! Shared fixtures: real chunk-store gRPC servers on loopback ports.

use crate::registry::service::NodeClient;
use crate::storage::disk::ChunkStore;
use crate::storage::protocol::{FileTransferServiceClient, MAX_MESSAGE_SIZE};
use crate::storage::service::{ChunkStoreService, serve};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub(crate) struct TestNode {
    pub name: String,
    pub addr: SocketAddr,
    pub store: Arc<ChunkStore>,
    pub _dir: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestNode {
    pub async fn spawn(name: &str) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(ChunkStore::open(dir.path(), name).await.expect("open store"));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let (tx, rx) = oneshot::channel::<()>();
        let service = ChunkStoreService::new(store.clone(), name);
        let handle = tokio::spawn(async move {
            let _ = serve(listener, service, async {
                let _ = rx.await;
            })
            .await;
        });

        Self {
            name: name.to_string(),
            addr,
            store,
            _dir: dir,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub async fn client(&self) -> NodeClient {
        let channel = tonic::transport::Endpoint::from_shared(format!("http://{}", self.addr))
            .expect("endpoint")
            .connect()
            .await
            .expect("connect");
        FileTransferServiceClient::new(channel)
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_MESSAGE_SIZE)
    }

    /// Stops the server and waits until every connection is drained.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(mut handle) = self.handle.take()
            && tokio::time::timeout(Duration::from_secs(5), &mut handle)
                .await
                .is_err()
        {
            handle.abort();
        }
    }
}
