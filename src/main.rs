//! Distributed backend health checker.
//!
//! Listens for dead-backend announcements, confirms each incident with
//! active HTTP probes, and keeps the shared store's dead set accurate until
//! the backend is stable again.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌─────────────────────────────────────────────────────┐
//!   Redis pub/sub  │                    HCHECKER                          │
//!   "dead" channel │  ┌────────────┐    ┌────────────┐    ┌──────────┐   │
//!  ────────────────┼─▶│coordinator │───▶│ dispatcher │───▶│  check   │───┼──▶ Backend
//!                  │  │ subscribe  │    │ + registry │    │ (1/URL)  │   │    (probe)
//!                  │  └────────────┘    └────────────┘    └────┬─────┘   │
//!                  │         ▲                                  │         │
//!   Redis keys     │         │      lease / dead / alive        │         │
//!  ◀───────────────┼─────────┴──────────────────────────────────┘         │
//!                  │                                                       │
//!                  │  ┌────────────┐ ┌────────────┐ ┌──────────────────┐  │
//!                  │  │   config   │ │ supervisor │ │  observability   │  │
//!                  │  └────────────┘ └────────────┘ └──────────────────┘  │
//!                  └─────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use health_checker::config::{self, ConfigOverrides, ObservabilityConfig};
use health_checker::lifecycle;
use health_checker::observability::logging;

#[derive(Parser)]
#[command(name = "hchecker")]
#[command(version, about = "Distributed backend health checker", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP method used by probes
    #[arg(long)]
    method: Option<String>,

    /// Path requested by probes
    #[arg(long)]
    uri: Option<String>,

    /// Host header sent by probes
    #[arg(long)]
    host: Option<String>,

    /// Seconds between probes
    #[arg(long)]
    interval: Option<u64>,

    /// Connect timeout in seconds
    #[arg(long)]
    connect: Option<u64>,

    /// Read/write timeout in seconds
    #[arg(long)]
    io: Option<u64>,

    /// Store address, `host:port` or `redis://` URL
    #[arg(long)]
    redis: Option<String>,

    /// Probe and log, but never write to the store
    #[arg(long)]
    dryrun: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the version and exit
    Version,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            method: self.method.clone(),
            path: self.uri.clone(),
            host: self.host.clone(),
            interval_secs: self.interval,
            connect_timeout_secs: self.connect,
            io_timeout_secs: self.io,
            store_url: self.redis.clone(),
            dry_run: self.dryrun,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(Commands::Version) = cli.command {
        println!("hchecker {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let config = match config::load_config(cli.config.as_deref(), cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            logging::init(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.observability);

    tracing::info!("hchecker v{} starting", env!("CARGO_PKG_VERSION"));

    match lifecycle::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            ExitCode::FAILURE
        }
    }
}
