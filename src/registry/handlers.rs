use super::service::NodeRegistry;
use super::types::{REGISTERED_OK, RegisterRequest};
use crate::error::TransferError;

use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

pub async fn handle_register(
    Extension(registry): Extension<Arc<NodeRegistry>>,
    Json(req): Json<RegisterRequest>,
) -> (StatusCode, String) {
    match registry.register(&req.service_name, &req.grpc_address).await {
        Ok(()) => {
            tracing::info!(
                "Registered new client: {}. Total clients: {:?}",
                req.service_name,
                registry.list_names()
            );
            (StatusCode::OK, REGISTERED_OK.to_string())
        }
        Err(e @ TransferError::Conflict(_)) => {
            tracing::warn!("Rejected registration of {}: {}", req.service_name, e);
            (StatusCode::CONFLICT, format!("Failed to register client: {}", e))
        }
        Err(e) => {
            // Unreachable or malformed addresses are the caller's problem: 4xx.
            tracing::warn!("Rejected registration of {}: {}", req.service_name, e);
            (StatusCode::BAD_REQUEST, format!("Failed to register client: {}", e))
        }
    }
}

pub async fn handle_list_clients(
    Extension(registry): Extension<Arc<NodeRegistry>>,
) -> Json<Vec<String>> {
    Json(registry.list_names())
}
