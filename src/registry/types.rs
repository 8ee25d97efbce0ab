use serde::{Deserialize, Serialize};

/// Endpoint nodes call to join the cluster.
pub const ENDPOINT_REGISTER: &str = "/register";
/// Endpoint listing registered node names.
pub const ENDPOINT_CLIENTS: &str = "/clients";

/// Registration payload sent by a storage node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    /// Unique node identity; also the node's storage namespace.
    pub service_name: String,
    /// `host:port` of the node's gRPC endpoint, as reachable from the coordinator.
    pub grpc_address: String,
}

/// Confirmation text for a successful registration.
pub const REGISTERED_OK: &str = "Client registered successfully";
