use chunkvault::config::NodeConfig;
use chunkvault::registry::client::register_with_coordinator;
use chunkvault::registry::types::RegisterRequest;
use chunkvault::storage::disk::ChunkStore;
use chunkvault::storage::service::{ChunkStoreService, serve};

use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,h2=warn,hyper=warn".into()),
        )
        .init();

    let config = NodeConfig::parse();

    // 1. Chunk store:
    let store = Arc::new(ChunkStore::open(&config.storage_dir, &config.service_name).await?);
    tracing::info!(
        "Storage node {} keeping chunks in {}",
        config.service_name,
        store.root().display()
    );

    // 2. gRPC server:
    let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
    tracing::info!("gRPC server listening on {}", listener.local_addr()?);

    let service = ChunkStoreService::new(store, &config.service_name);
    let server = tokio::spawn(serve(listener, service, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down storage node");
    }));

    // 3. Register with the coordinator once the server is accepting:
    let request = RegisterRequest {
        service_name: config.service_name.clone(),
        grpc_address: config.grpc_address(),
    };
    let http = reqwest::Client::new();
    if let Err(e) = register_with_coordinator(
        &http,
        &config.transfer_service_url,
        &request,
        config.register_attempts,
    )
    .await
    {
        tracing::error!("Failed to register with Transfer Service: {}", e);
        server.abort();
        return Err(e.into());
    }

    server.await??;
    Ok(())
}
