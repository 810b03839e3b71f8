//! Modelgate Server - HTTP gallery API for the inference gateway.
//!
//! This binary wraps the modelgate-core gallery service: it applies startup
//! preloads, then serves the `/models/*` endpoints until interrupted.

mod auth;
mod handler;
mod handlers;
mod server;

use anyhow::Result;
use clap::Parser;
use modelgate_core::{startup, AppConfig, GalleryService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "modelgate-server")]
#[command(about = "Model gallery API for the modelgate inference gateway")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "8080", env = "MODELGATE_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "MODELGATE_HOST")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Directory holding model definitions and artifacts
    #[arg(long, default_value = "./models", env = "MODELGATE_MODELS_PATH")]
    models_path: PathBuf,

    /// Galleries as a JSON array of {"name", "url"}
    #[arg(long, env = "MODELGATE_GALLERIES")]
    galleries: Option<String>,

    /// Hide error details in job statuses
    #[arg(long, env = "MODELGATE_OPAQUE_ERRORS")]
    opaque_errors: bool,

    /// JSON file listing models to install at startup
    #[arg(long, env = "MODELGATE_PRELOAD_MODELS_CONFIG")]
    preload_models_config: Option<PathBuf>,

    /// Inline JSON list of models to install at startup
    #[arg(long, env = "MODELGATE_PRELOAD_MODELS")]
    preload_models: Option<String>,

    /// Definition files to fetch into the models path at startup
    #[arg(long, env = "MODELGATE_MODELS_URL", value_delimiter = ',')]
    models_url: Vec<String>,

    /// Bearer keys required on the /models routes (comma-separated)
    #[arg(long, env = "MODELGATE_API_KEYS", value_delimiter = ',')]
    api_keys: Vec<String>,
}

impl Args {
    fn app_config(&self) -> AppConfig {
        let mut config = AppConfig::new(&self.models_path)
            .with_opaque_errors(self.opaque_errors)
            .with_models_url(self.models_url.iter().cloned())
            .with_api_keys(self.api_keys.iter().cloned());
        if let Some(galleries) = &self.galleries {
            config = config.with_string_galleries(galleries);
        }
        if let Some(path) = &self.preload_models_config {
            config = config.with_preload_file(path);
        }
        if let Some(payload) = &self.preload_models {
            config = config.with_preload_json(payload.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG takes precedence over --debug
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting modelgate server");

    let config = args.app_config();
    info!("Models path: {}", config.model_path.display());

    let service = Arc::new(GalleryService::start(config).await?);

    let bulk = service.bulk_applier();
    let reconciler = service.reconciler();
    if let Err(e) = startup::preload(service.config(), &bulk, reconciler.as_ref()).await {
        warn!("Startup preload finished with errors: {}", e);
    }

    let addr = server::start_server(service.clone(), &args.host, args.port).await?;

    // Read by tests and supervisors when --port 0 is used
    println!("MODELGATE_PORT={}", addr.port());

    info!("Gallery API running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, draining gallery worker");
    service.shutdown().await;

    Ok(())
}
