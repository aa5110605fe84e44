//! Corn Leaf Classifier Server
//!
//! HTTP API serving a pretrained corn leaf disease classifier. Uploaded
//! images are classified as Blight, Common, Gray or Healthy, and a
//! question endpoint echoes questions into a fixed template.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cornleaf::model::DEFAULT_MODEL_PATH;
use cornleaf::upload::DEFAULT_UPLOAD_DIR;
use cornleaf::utils::{init_logging, LogConfig, LogLevel};
use cornleaf::PixelScaling;
use tracing::{error, info, warn};

use crate::state::{AppState, ServerConfig};

/// Corn Leaf Classifier Server
#[derive(Parser, Debug)]
#[command(name = "cornleaf-server")]
#[command(author = "Warre Snaet")]
#[command(version = "0.1.0")]
#[command(about = "HTTP API server for corn leaf disease classification")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "CORNLEAF_PORT", default_value = "8081")]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "CORNLEAF_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Trained model artifact (.mpk)
    #[arg(long, env = "CORNLEAF_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,

    /// Directory for transient uploads
    #[arg(long, env = "CORNLEAF_UPLOAD_DIR", default_value = DEFAULT_UPLOAD_DIR)]
    upload_dir: PathBuf,

    /// Pixel scaling before inference: raw, unit or imagenet
    #[arg(long, env = "CORNLEAF_PIXEL_SCALING", default_value = "raw")]
    pixel_scaling: PixelScaling,

    /// Maximum request body size in MiB
    #[arg(long, env = "CORNLEAF_MAX_UPLOAD_MB", default_value = "10")]
    max_upload_mb: usize,

    /// Load the model at startup instead of on the first prediction
    #[arg(long, env = "CORNLEAF_PRELOAD")]
    preload: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CORNLEAF_LOG_LEVEL", default_value = "info")]
    log_level: LogLevel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&LogConfig::default().with_level(cli.log_level)).map_err(anyhow::Error::msg)?;

    // Build configuration
    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        model_path: cli.model_path,
        upload_dir: cli.upload_dir,
        pixel_scaling: cli.pixel_scaling,
        max_upload_mb: cli.max_upload_mb,
        preload: cli.preload,
    };

    info!("Corn Leaf Classifier Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Model path:    {:?}", config.model_path);
    info!("  Upload dir:    {:?}", config.upload_dir);
    info!("  Pixel scaling: {}", config.pixel_scaling);
    info!("  Max upload:    {} MiB", config.max_upload_mb);
    info!("  Backend:       {}", cornleaf::backend::backend_name());

    // Check if the model exists
    if !config.model_path.exists() {
        warn!(
            "Model not found at {:?}. Predictions will fail until it is in place.",
            config.model_path
        );
    }

    // Create shared state
    let state = Arc::new(AppState::new(config));
    state
        .pipeline
        .uploads()
        .ensure_dir()
        .with_context(|| format!("creating upload directory {:?}", state.config.upload_dir))?;

    if state.config.preload {
        let preload_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = preload_state.pipeline.model_cache().ensure_loaded().await {
                error!("Model preload failed: {}", e);
            }
        });
    }

    let app = routes::router(state.clone());

    // Start server
    let addr: SocketAddr = state.config.bind_address().parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
