//! `wl-client` — issues RFWs and writes each received batch to a CSV file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use workload_relay::{
    ClientConfig, DEFAULT_PORT, RequestSpec, Result, WorkloadClient, load_request_file,
    wait_for_signal,
};

/// Requests batches of workload samples and writes them to CSV files.
#[derive(Parser)]
#[command(name = "wl-client", version, about)]
struct Cli {
    /// Remote host to connect to.
    #[arg(long = "hostip", default_value = "127.0.0.1")]
    hostip: String,

    /// Connect to a server on this machine (overrides --hostip).
    #[arg(short, long)]
    local: bool,

    /// Remote port to connect to.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory received batches are written to.
    #[arg(long, default_value = "batches")]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Issue every request listed in a CSV file with columns
    /// `protocol, bench_type, metrics, batch_unit, batch_id, batch_size`.
    Batch {
        /// Path of the request file
        file: PathBuf,
    },
    /// Issue a single request described inline.
    Single {
        /// Payload encoding, JSON or BUFF
        #[arg(default_value = "JSON")]
        protocol: String,
        /// Dataset label prefix to draw samples from
        #[arg(default_value = "DVD-training")]
        bench_type: String,
        /// Metrics mask (cpu=8, net_in=4, net_out=2, memory=1)
        #[arg(default_value_t = 13)]
        metrics: u8,
        /// Rows per batch
        #[arg(default_value_t = 1000)]
        batch_unit: u32,
        /// First batch index
        #[arg(default_value_t = 0)]
        batch_id: u32,
        /// Number of batches
        #[arg(default_value_t = 2)]
        batch_size: u32,
    },
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
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "client failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let requests: Vec<RequestSpec> = match &cli.command {
        Command::Batch { file } => load_request_file(file)?,
        Command::Single {
            protocol,
            bench_type,
            metrics,
            batch_unit,
            batch_id,
            batch_size,
        } => vec![RequestSpec::single(
            protocol,
            bench_type,
            *metrics,
            *batch_unit,
            *batch_id,
            *batch_size,
        )],
    };

    let config = ClientConfig {
        host: if cli.local {
            "127.0.0.1".to_string()
        } else {
            cli.hostip.clone()
        },
        port: cli.port,
        output_dir: cli.output_dir.clone(),
        ..ClientConfig::default()
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("quitting, waiting for pending work");
        signal_token.cancel();
    });

    let client = WorkloadClient::new(config);
    let summary = client.run(requests, shutdown).await?;
    Ok(summary.failed == 0 && summary.write_failures == 0)
}
