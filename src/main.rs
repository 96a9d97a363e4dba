//! `contention-lab` binary: serve the HTTP surface or run an in-process
//! load simulation.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use contention_lab::service;
use contention_lab::simulate::{run_load, LoadPlan};
use contention_lab::{Config, ServiceContext};

#[derive(Parser, Debug)]
#[command(name = "contention-lab")]
#[command(about = "Dual-lock deadlock demonstration with latency and health monitoring")]
struct Cli {
    /// TOML config file; environment variables override it
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve {
        /// Listen address, e.g. 0.0.0.0:8080
        #[arg(long)]
        bind: Option<String>,
        /// Run the dual-lock protocol on business requests
        #[arg(long)]
        simulate_contention: bool,
        /// Take the locks in the same order on both paths
        #[arg(long)]
        consistent_order: bool,
    },
    /// Fire concurrent order/inventory pairs in-process and print a summary
    Simulate {
        #[arg(long, default_value_t = 4)]
        pairs: usize,
        #[arg(long, default_value_t = 5)]
        rounds: usize,
        /// Take the locks in the same order on both paths
        #[arg(long)]
        consistent_order: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve {
        bind: None,
        simulate_contention: false,
        consistent_order: false,
    }) {
        Command::Serve {
            bind,
            simulate_contention,
            consistent_order,
        } => {
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            config.enable_deadlock_simulation |= simulate_contention;
            config.use_consistent_lock_order |= consistent_order;

            let addr = config.bind_address.clone();
            let ctx = Arc::new(ServiceContext::new(config));
            service::serve_with_shutdown(ctx, &addr, shutdown_signal()).await?;
            tracing::info!("server stopped");
        }
        Command::Simulate {
            pairs,
            rounds,
            consistent_order,
        } => {
            config.enable_deadlock_simulation = true;
            config.use_consistent_lock_order |= consistent_order;

            let ctx = Arc::new(ServiceContext::new(config));
            let summary = run_load(ctx, LoadPlan { pairs, rounds }).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
