//! Coordinator wiring: shared components and the HTTP router.

use crate::metadata::MetadataStore;
use crate::registry::handlers::{handle_list_clients, handle_register};
use crate::registry::service::NodeRegistry;
use crate::registry::types::{ENDPOINT_CLIENTS, ENDPOINT_REGISTER};
use crate::transfer::download::DownloadPipeline;
use crate::transfer::handlers::{
    handle_delete_file, handle_download, handle_file_info, handle_upload,
};
use crate::transfer::protocol::{ENDPOINT_DOWNLOAD, ENDPOINT_FILES, ENDPOINT_UPLOAD};
use crate::transfer::upload::UploadPipeline;

use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Settings the coordinator components are built from.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub chunk_size: usize,
    pub max_upload_size: usize,
    pub fetch_timeout: Duration,
    pub session_timeout: Duration,
}

#[derive(Clone)]
pub struct Coordinator {
    pub registry: Arc<NodeRegistry>,
    pub metadata: Arc<dyn MetadataStore>,
    pub upload: Arc<UploadPipeline>,
    pub download: Arc<DownloadPipeline>,
    max_upload_size: usize,
}

impl Coordinator {
    pub fn new(
        registry: Arc<NodeRegistry>,
        metadata: Arc<dyn MetadataStore>,
        options: &CoordinatorOptions,
    ) -> Self {
        let upload = Arc::new(UploadPipeline::new(
            registry.clone(),
            metadata.clone(),
            options.chunk_size,
            options.session_timeout,
        ));
        let download = Arc::new(DownloadPipeline::new(
            registry.clone(),
            metadata.clone(),
            options.fetch_timeout,
        ));

        Self {
            registry,
            metadata,
            upload,
            download,
            max_upload_size: options.max_upload_size,
        }
    }

    pub fn router(&self) -> Router {
        let file_route = format!("{}/:filename", ENDPOINT_FILES);

        Router::new()
            .route(ENDPOINT_REGISTER, post(handle_register))
            .route(ENDPOINT_CLIENTS, get(handle_list_clients))
            .route(ENDPOINT_UPLOAD, post(handle_upload))
            .route(ENDPOINT_DOWNLOAD, get(handle_download))
            .route(&file_route, get(handle_file_info).delete(handle_delete_file))
            .layer(DefaultBodyLimit::max(self.max_upload_size))
            .layer(Extension(self.registry.clone()))
            .layer(Extension(self.metadata.clone()))
            .layer(Extension(self.upload.clone()))
            .layer(Extension(self.download.clone()))
            .layer(TraceLayer::new_for_http())
    }

    /// Logs the registered nodes every `period`.
    pub fn spawn_stats_reporter(&self, period: Duration) -> JoinHandle<()> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let nodes = registry.list_nodes();
                tracing::info!("Cluster stats: {} registered nodes", nodes.len());
                for node in nodes {
                    tracing::info!("  - {} grpc={}", node.name, node.address);
                }
            }
        })
    }
}
