//! `wl-server` — listens for RFWs and streams RFD batches out of the
//! local sample store.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use workload_relay::{
    DEFAULT_PORT, Result, SampleStore, ServerConfig, StoreConfig, WorkloadServer,
    wait_for_signal,
};

/// Listens and responds to properly formatted RFWs.
#[derive(Parser)]
#[command(name = "wl-server", version, about)]
struct Cli {
    /// Listen on 127.0.0.1 only instead of all interfaces.
    #[arg(short, long)]
    local: bool,

    /// Skip store population and serve whatever the database holds.
    #[arg(long)]
    skipdb: bool,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Path of the sample store database.
    #[arg(long, default_value = "workload.db")]
    db_path: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => {
            tracing::info!("exiting server");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ServerConfig {
        host: if cli.local {
            tracing::info!("starting server for local connections");
            "127.0.0.1".to_string()
        } else {
            tracing::info!("starting server on all interfaces");
            "0.0.0.0".to_string()
        },
        port: cli.port,
        store: StoreConfig {
            db_path: cli.db_path,
            skip_bootstrap: cli.skipdb,
            ..StoreConfig::default()
        },
        ..ServerConfig::default()
    };

    let store = SampleStore::open(&config.store).await?;
    if !config.store.skip_bootstrap {
        store.bootstrap(&config.store).await?;
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_token.cancel();
    });

    let server = WorkloadServer::new(config, Arc::new(store));
    server.run(shutdown).await
}
