//! Process Configuration
//!
//! Both binaries read their settings from command-line flags, falling back to
//! the environment. Variable names match the container deployment.

use crate::metadata::postgres::PgParams;
use crate::registry::service::DEFAULT_DIAL_TIMEOUT;
use crate::storage::protocol::MAX_CHUNK_SIZE;

use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetadataBackend {
    Postgres,
    Memory,
}

/// Settings of the coordinator ("transfer service").
#[derive(Debug, Clone, Parser)]
#[command(name = "transfer-service", about = "Chunk placement coordinator")]
pub struct CoordinatorConfig {
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: IpAddr,

    #[arg(long, env = "SERVER_PORT", default_value_t = 8080)]
    pub server_port: u16,

    #[arg(long, env = "CHUNK_SIZE_BYTES", default_value_t = 1024 * 1024)]
    pub chunk_size: usize,

    #[arg(long, env = "MAX_UPLOAD_SIZE_GB", default_value_t = 2)]
    pub max_upload_size_gb: u64,

    #[arg(long, env = "METADATA_BACKEND", value_enum, default_value = "postgres")]
    pub metadata_backend: MetadataBackend,

    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    pub postgres_host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    #[arg(long, env = "POSTGRES_USER", default_value = "user")]
    pub postgres_user: String,

    #[arg(long, env = "POSTGRES_PASSWORD", default_value = "password", hide_env_values = true)]
    pub postgres_password: String,

    #[arg(long, env = "POSTGRES_DB", default_value = "dbname")]
    pub postgres_db: String,

    #[arg(long, env = "POSTGRES_MAX_CONNECTIONS", default_value_t = 10)]
    pub postgres_max_connections: u32,

    #[arg(long, env = "REGISTER_TIMEOUT_SECS", default_value_t = DEFAULT_DIAL_TIMEOUT.as_secs())]
    pub register_timeout_secs: u64,

    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 10)]
    pub fetch_timeout_secs: u64,

    #[arg(long, env = "SESSION_TIMEOUT_SECS", default_value_t = 300)]
    pub session_timeout_secs: u64,
}

impl CoordinatorConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.server_port)
    }

    pub fn max_upload_size(&self) -> usize {
        usize::try_from(self.max_upload_size_gb.saturating_mul(GIB)).unwrap_or(usize::MAX)
    }

    pub fn pg_params(&self) -> PgParams {
        PgParams {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            user: self.postgres_user.clone(),
            password: self.postgres_password.clone(),
            database: self.postgres_db.clone(),
            max_connections: self.postgres_max_connections,
        }
    }

    pub fn register_timeout(&self) -> Duration {
        Duration::from_secs(self.register_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("CHUNK_SIZE_BYTES must be greater than zero");
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            anyhow::bail!(
                "CHUNK_SIZE_BYTES must not exceed {} bytes, got {}",
                MAX_CHUNK_SIZE,
                self.chunk_size
            );
        }
        if self.max_upload_size_gb == 0 {
            anyhow::bail!("MAX_UPLOAD_SIZE_GB must be greater than zero");
        }
        Ok(())
    }
}

/// Settings of a storage node.
#[derive(Debug, Clone, Parser)]
#[command(name = "chunkvault-node", about = "Content-addressed chunk storage node")]
pub struct NodeConfig {
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: IpAddr,

    #[arg(long, env = "GRPC_PORT", default_value_t = 5001)]
    pub grpc_port: u16,

    #[arg(long, env = "TRANSFER_SERVICE_URL", default_value = "http://transfer_service:8080")]
    pub transfer_service_url: String,

    #[arg(long, env = "STORAGE_DIR", default_value = "./storage")]
    pub storage_dir: PathBuf,

    #[arg(long, env = "SERVICE_NAME", default_value = "default_service_name")]
    pub service_name: String,

    /// Address the coordinator dials; defaults to `SERVICE_NAME:GRPC_PORT`.
    #[arg(long, env = "ADVERTISE_ADDRESS")]
    pub advertise_address: Option<String>,

    #[arg(long, env = "REGISTER_ATTEMPTS", default_value_t = 5)]
    pub register_attempts: usize,
}

impl NodeConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.grpc_port)
    }

    pub fn grpc_address(&self) -> String {
        self.advertise_address
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.service_name, self.grpc_port))
    }
}
