use crate::error::{Result, TransferError};
use crate::storage::protocol::{FileTransferServiceClient, MAX_MESSAGE_SIZE};

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

/// Default bound on the dial performed during registration.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// gRPC client for one storage node. Cloning shares the underlying channel.
pub type NodeClient = FileTransferServiceClient<Channel>;

/// A registered storage node.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub name: String,
    pub address: String,
    pub client: NodeClient,
}

/// Registry of live storage nodes, keyed by service name.
pub struct NodeRegistry {
    nodes: RwLock<HashMap<String, NodeEntry>>,
    dial_timeout: Duration,
}

impl NodeRegistry {
    pub fn new(dial_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            nodes: RwLock::new(HashMap::new()),
            dial_timeout,
        })
    }

    /// Dials `address` and records it under `name`.
    ///
    /// Fails with `Conflict` if `name` is taken, before or after the dial.
    /// The dial runs without the lock held, so registrations of different
    /// names proceed in parallel; for the same name the first insert wins.
    pub async fn register(&self, name: &str, address: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(TransferError::BadRequest("service_name is empty".to_string()));
        }
        if address.trim().is_empty() {
            return Err(TransferError::BadRequest("grpc_address is empty".to_string()));
        }

        if self.nodes.read().contains_key(name) {
            return Err(already_registered(name));
        }

        let client = self.dial(name, address).await?;

        let mut nodes = self.nodes.write();
        if nodes.contains_key(name) {
            return Err(already_registered(name));
        }
        nodes.insert(
            name.to_string(),
            NodeEntry {
                name: name.to_string(),
                address: address.to_string(),
                client,
            },
        );
        let total = nodes.len();
        drop(nodes);

        tracing::info!(node = %name, %address, "Registered node ({} total)", total);
        Ok(())
    }

    async fn dial(&self, name: &str, address: &str) -> Result<NodeClient> {
        let uri = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };

        let endpoint = Endpoint::from_shared(uri)
            .map_err(|e| TransferError::BadRequest(format!("invalid grpc_address {}: {}", address, e)))?
            .connect_timeout(self.dial_timeout);

        let channel = match tokio::time::timeout(self.dial_timeout, endpoint.connect()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => {
                tracing::warn!(node = %name, %address, "Dial failed: {}", e);
                return Err(TransferError::upstream(name, format!("dial {} failed: {}", address, e)));
            }
            Err(_) => {
                tracing::warn!(node = %name, %address, "Dial timed out");
                return Err(TransferError::upstream(
                    name,
                    format!("dial {} timed out after {:?}", address, self.dial_timeout),
                ));
            }
        };

        Ok(FileTransferServiceClient::new(channel)
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_MESSAGE_SIZE))
    }

    /// Current connection for `name`, if registered.
    pub fn lookup(&self, name: &str) -> Option<NodeClient> {
        self.nodes.read().get(name).map(|entry| entry.client.clone())
    }

    /// Sorted snapshot of registered names.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of every registered node, sorted by name.
    pub fn list_nodes(&self) -> Vec<NodeEntry> {
        let mut nodes: Vec<NodeEntry> = self.nodes.read().values().cloned().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    }

    /// Snapshot of connections keyed by name.
    pub fn connections(&self) -> HashMap<String, NodeClient> {
        self.nodes
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.client.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

fn already_registered(name: &str) -> TransferError {
    TransferError::Conflict(format!("node {} is already registered", name))
}
