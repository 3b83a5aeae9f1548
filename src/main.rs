use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod guard;
mod s3_client;
mod storage;

use config::StorageConfig;
use guard::BucketService;
use s3_client::S3Storage;

#[derive(Parser)]
#[command(name = "bucket-gateway")]
#[command(about = "HTTP gateway for bucket and object lifecycle operations on S3-compatible storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0", env = "GATEWAY_HOST")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 8000, env = "GATEWAY_PORT")]
        port: u16,
        /// Environment file with MINIO_* settings
        #[arg(long, default_value = ".env")]
        env_file: PathBuf,
        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Largest accepted request body in bytes
        #[arg(long, default_value_t = 100 * 1024 * 1024, env = "GATEWAY_MAX_UPLOAD_BYTES")]
        max_upload_bytes: usize,
    },
    /// Write a template configuration file
    InitConfig {
        /// Output file for the template
        #[arg(short, long, default_value = "bucket-gateway.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bucket_gateway=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            env_file,
            config,
            max_upload_bytes,
        } => {
            info!("Loading configuration from {:?}", env_file);
            let storage_config = StorageConfig::load(&env_file, config.as_deref())
                .context("Failed to load storage settings")?;

            info!("Connecting to storage backend at {}", storage_config.endpoint);
            let storage = S3Storage::new(storage_config).await;
            let service = BucketService::new(Arc::new(storage));
            let app = api::create_router(service, max_upload_bytes);

            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;

            info!("Listening on http://{}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error")?;

            info!("Server stopped");
        }
        Commands::InitConfig { output } => {
            if output.exists() {
                anyhow::bail!("{:?} already exists", output);
            }
            std::fs::write(&output, StorageConfig::default_config())
                .with_context(|| format!("Failed to write {:?}", output))?;
            info!("Configuration template saved to {:?}", output);
            info!("MINIO_* environment variables override values in this file.");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
