//! order-sync - Rate-limited, resumable order history synchronization
//!
//! This is the command line entry point.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};

use order_sync::config::Config;
use order_sync::models::SyncState;
use order_sync::storage::{FilesystemStore, StateStore};
use order_sync::sync::{top_products, HttpOrderApi, OrderSyncCoordinator, SyncOptions};
use order_sync::telemetry::init_tracing;

/// order-sync - Rate-limited, resumable order history synchronization
#[derive(Parser, Debug)]
#[command(name = "order-sync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "ORDER_SYNC_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process the next unprocessed order
    Sync {
        /// Download the order list again instead of using the cached copy
        #[arg(long)]
        refresh: bool,

        /// Keep going until every order is processed
        #[arg(long)]
        all: bool,

        /// Upper bound on invocations when used with --all
        #[arg(long)]
        max_runs: Option<usize>,
    },

    /// Show sync progress
    Status,

    /// List the most frequently purchased products
    Products {
        /// Number of products to show
        #[arg(long, default_value_t = 20)]
        top: usize,
    },

    /// Forget all processed orders and products, keeping the cached order list
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;
    config.validate()?;

    // Initialize tracing/logging
    init_tracing(&config.logging.level, &config.logging.format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        customer_id = %config.customer_id,
        "Starting order-sync"
    );

    let store = Arc::new(FilesystemStore::new_with_init(&config.storage.data_dir).await?);
    info!(data_dir = %config.storage.data_dir, "State store initialized");

    match args.command {
        Command::Sync {
            refresh,
            all,
            max_runs,
        } => run_sync(&config, store, refresh, all, max_runs).await,
        Command::Status => show_status(&config, store.as_ref()).await,
        Command::Products { top } => show_products(store.as_ref(), top).await,
        Command::Reset => {
            store.reset().await?;
            println!("Products and processed orders cleared");
            Ok(())
        }
    }
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

async fn run_sync(
    config: &Config,
    store: Arc<FilesystemStore>,
    refresh: bool,
    all: bool,
    max_runs: Option<usize>,
) -> anyhow::Result<()> {
    let api = Arc::new(HttpOrderApi::new(&config.api)?);
    let coordinator = Arc::new(OrderSyncCoordinator::from_config(config, api, store));

    // Cancel the in-flight run on Ctrl+C / SIGTERM
    let canceller = coordinator.clone();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        canceller.cancel();
    });

    let options = SyncOptions {
        refresh_catalog: refresh,
    };
    let state = if all {
        coordinator.run_until_complete_with(options, max_runs).await
    } else {
        coordinator.start_with(options).await
    };
    signal_task.abort();

    match state {
        Some(SyncState::Completed { stats }) => {
            println!(
                "Products before: {}, found: {}, added: {}, orders remaining: {}",
                stats.products_before,
                stats.products_found,
                stats.products_added,
                stats.remaining_orders
            );
            Ok(())
        }
        Some(SyncState::Cancelled) => {
            println!("Sync cancelled");
            Ok(())
        }
        Some(SyncState::Error { message, .. }) => anyhow::bail!(message),
        Some(other) => anyhow::bail!("Sync ended in unexpected state {:?}", other),
        None => anyhow::bail!("Sync did not run"),
    }
}

async fn show_status(config: &Config, store: &dyn StateStore) -> anyhow::Result<()> {
    let snapshot = store.load_orders(&config.customer_id).await?;
    let processed = store.load_processed().await?;
    let products = store.load_products().await?;

    println!("Customer:          {}", config.customer_id);
    match &snapshot {
        Some(snapshot) => {
            let pending = snapshot
                .orders
                .iter()
                .filter(|order| !processed.contains(&order.id))
                .count();
            println!(
                "Cached orders:     {} (fetched {})",
                snapshot.orders.len(),
                snapshot.fetched_at.to_rfc3339()
            );
            println!("Pending orders:    {}", pending);
        }
        None => println!("Cached orders:     none"),
    }
    println!("Processed orders:  {}", processed.len());
    println!("Products:          {}", products.len());
    if let Some(at) = processed.last_processed_at() {
        println!("Last processed:    {}", at.to_rfc3339());
    }

    Ok(())
}

async fn show_products(store: &dyn StateStore, top: usize) -> anyhow::Result<()> {
    let products = store.load_products().await?;

    for product in top_products(&products, top) {
        println!(
            "{:>5}x  {:>10.2}  {}  {}{}",
            product.frequency,
            product.total_quantity,
            product.last_purchase.format("%Y-%m-%d"),
            product.name,
            product
                .category
                .as_deref()
                .map(|c| format!(" [{}]", c))
                .unwrap_or_default()
        );
    }

    Ok(())
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling sync");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling sync");
        }
    }
}
