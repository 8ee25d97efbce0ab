use chunkvault::app::{Coordinator, CoordinatorOptions};
use chunkvault::config::{CoordinatorConfig, MetadataBackend};
use chunkvault::metadata::MetadataStore;
use chunkvault::metadata::memory::MemoryMetadataStore;
use chunkvault::metadata::postgres::PgMetadataStore;
use chunkvault::registry::service::NodeRegistry;

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

const DB_CONNECT_ATTEMPTS: usize = 12;
const DB_RETRY_DELAY: Duration = Duration::from_secs(5);
const STATS_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,h2=warn,hyper=warn".into()),
        )
        .init();

    let config = CoordinatorConfig::parse();
    config.validate()?;

    tracing::info!(
        "Starting transfer service (chunk size {} bytes, upload cap {} GB)",
        config.chunk_size,
        config.max_upload_size_gb
    );

    // 1. Metadata store:
    let metadata: Arc<dyn MetadataStore> = match config.metadata_backend {
        MetadataBackend::Postgres => {
            let store = PgMetadataStore::connect_with_retry(
                &config.pg_params(),
                DB_CONNECT_ATTEMPTS,
                DB_RETRY_DELAY,
            )
            .await?;
            store.migrate().await?;
            tracing::info!("Successfully connected to the database");
            Arc::new(store)
        }
        MetadataBackend::Memory => {
            tracing::warn!("Using in-memory metadata store; file records are lost on restart");
            Arc::new(MemoryMetadataStore::new())
        }
    };

    // 2. Node registry and pipelines:
    let registry = NodeRegistry::new(config.register_timeout());
    let coordinator = Coordinator::new(
        registry,
        metadata,
        &CoordinatorOptions {
            chunk_size: config.chunk_size,
            max_upload_size: config.max_upload_size(),
            fetch_timeout: config.fetch_timeout(),
            session_timeout: config.session_timeout(),
        },
    );

    // 3. Stats reporter:
    coordinator.spawn_stats_reporter(STATS_INTERVAL);

    // 4. HTTP server:
    let app = coordinator.router();
    let addr = config.listen_addr();
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down transfer service");
        })
        .await?;

    Ok(())
}
