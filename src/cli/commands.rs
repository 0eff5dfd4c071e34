use crate::config::AppConfig;
use crate::dispatcher::PooledHandler;
use crate::handlers::{echo, health, pool_stats, sleep, Routes};
use crate::logging::init_logging;
use crate::server::{GatewayService, HttpServer};
use crate::worker_pool::WorkerPool;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use http::Method;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Command-line interface for gatepool
#[derive(Parser)]
#[command(name = "gatepool", version)]
#[command(about = "Bounded worker pool HTTP gateway", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server until SIGINT/SIGTERM
    Serve {
        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen address, e.g. 127.0.0.1:8080
        #[arg(long)]
        addr: Option<String>,

        /// Number of worker coroutines
        #[arg(long)]
        workers: Option<usize>,

        /// Jobs that may wait for a worker before running inline
        #[arg(long)]
        queue_capacity: Option<usize>,
    },
    /// Print the resolved configuration as YAML
    Config {
        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Execute a parsed command.
pub fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            config,
            addr,
            workers,
            queue_capacity,
        } => {
            let mut app = AppConfig::load(config.as_deref())?;
            if let Some(addr) = addr {
                app.server.addr = addr;
            }
            if let Some(workers) = workers {
                app.pool.num_workers = workers;
            }
            if let Some(capacity) = queue_capacity {
                app.pool.queue_capacity = capacity;
            }
            app.validate()?;

            let _log_guard = init_logging(&app.logging)?;
            serve(app)
        }
        Commands::Config { config } => {
            let app = AppConfig::load(config.as_deref())?;
            print!("{}", app.to_yaml()?);
            Ok(())
        }
    }
}

/// The routes the binary serves. Demo endpoints go through the pool; the
/// probes answer directly so they stay responsive when the pool is saturated.
pub fn build_routes(pool: &Arc<WorkerPool>) -> Routes {
    Routes::new()
        .route(Method::GET, "/health", health)
        .route(Method::GET, "/pool/stats", pool_stats(Arc::clone(pool)))
        .route(Method::GET, "/echo", PooledHandler::new(echo, Arc::clone(pool)))
        .route(Method::POST, "/echo", PooledHandler::new(echo, Arc::clone(pool)))
        .route(Method::GET, "/sleep", PooledHandler::new(sleep, Arc::clone(pool)))
}

/// Start the pool and server, block until a shutdown signal, then drain.
pub fn serve(config: AppConfig) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.addr,
        num_workers = config.pool.num_workers,
        queue_capacity = config.pool.queue_capacity,
        "Starting gatepool"
    );

    let pool = Arc::new(WorkerPool::new("gateway", config.pool));
    pool.start().context("failed to start worker pool")?;

    let mut service = GatewayService::new(Arc::new(build_routes(&pool)));
    if let Some(timeout) = config.server.request_timeout() {
        service = service.with_request_timeout(timeout);
    }

    let addr = config.server.socket_addr()?;
    let handle = HttpServer(service)
        .start(addr)
        .with_context(|| format!("failed to bind {addr}"))?;

    wait_for_shutdown_signal()?;
    info!("Shutdown signal received, initiating graceful shutdown");

    let report = handle.shutdown(&pool, config.server.shutdown_timeout());
    info!(
        drained = report.drained,
        abandoned_jobs = report.abandoned_jobs,
        workers_remaining = report.workers_remaining,
        "Server exited"
    );
    Ok(())
}

#[cfg(unix)]
fn wait_for_shutdown_signal() -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to register signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal = signal, "Received signal");
    }
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown_signal() -> Result<()> {
    loop {
        std::thread::park();
    }
}
