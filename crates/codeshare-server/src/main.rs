//! codeshare-server binary
//!
//! Collaborative code session server with sandboxed execution.

use anyhow::Context;
use clap::Parser;
use codeshare_core::{
    CodeshareConfig, ConfigLoader, DockerRuntime, RecipeBook, SandboxExecutor,
};
use codeshare_server::{shutdown_signal, CodeshareServer, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Command line arguments for the codeshare server.
#[derive(Parser, Debug)]
#[command(name = "codeshare-server")]
#[command(about = "Collaborative code session server with sandboxed execution")]
#[command(version)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Execution timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Outbound queue capacity per client
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// WebSocket keep-alive interval in seconds
    #[arg(long)]
    keepalive: Option<u64>,

    /// Directory holding Dockerfile.<language> recipe overrides
    #[arg(long)]
    recipes_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Disable request logging
    #[arg(long)]
    no_logging: bool,
}

impl Args {
    /// Lay command line flags over the file configuration.
    fn apply(&self, config: &mut CodeshareConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind_addr = bind.clone();
        }
        if let Some(timeout) = self.timeout {
            config.sandbox.timeout_secs = timeout;
        }
        if let Some(capacity) = self.queue_capacity {
            config.hub.outbound_queue_capacity = capacity;
        }
        if let Some(keepalive) = self.keepalive {
            config.hub.keepalive_interval_secs = keepalive;
        }
        if let Some(dir) = &self.recipes_dir {
            config.sandbox.recipes_dir = Some(dir.clone());
        }
        if self.no_logging {
            config.server.enable_logging = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let mut config = ConfigLoader::from_optional_file(args.config.as_ref()).await?;
    args.apply(&mut config);
    config.validate()?;

    let recipes = match &config.sandbox.recipes_dir {
        Some(dir) => RecipeBook::from_dir(dir)
            .with_context(|| format!("Failed to read recipes from {}", dir.display()))?,
        None => RecipeBook::builtin(),
    };

    let runtime = DockerRuntime::connect().context("Failed to connect to Docker")?;
    if let Err(e) = runtime.ping().await {
        log::warn!("Docker daemon is not answering yet: {}", e);
    }
    let executor = Arc::new(SandboxExecutor::new(
        runtime,
        recipes,
        config.sandbox.clone(),
    ));

    let server_config = ServerConfig::from_config(&config)?;

    log::info!("Starting codeshare server...");
    log::info!("Configuration:");
    log::info!("  Bind address: {}", server_config.bind_addr);
    log::info!("  Execution timeout: {}s", config.sandbox.timeout_secs);
    log::info!("  Queue capacity: {}", config.hub.outbound_queue_capacity);
    log::info!("  Keep-alive: {}s", config.hub.keepalive_interval_secs);
    log::info!("  Logging enabled: {}", server_config.enable_logging);

    let server = CodeshareServer::new(executor, server_config);
    server.serve_with_shutdown(shutdown_signal()).await?;

    Ok(())
}
