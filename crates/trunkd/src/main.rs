//! trunkd - link aggregation control daemon entry point.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use trunk_engine::TrunkRegistry;
use trunkd::{ControlHandler, ControlResponse, DaemonConfig};

/// Link aggregation control daemon
#[derive(Parser, Debug)]
#[command(name = "trunkd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file declaring interfaces and trunks
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let registry = Arc::new(TrunkRegistry::new());

    let ifaces = match &args.config {
        Some(path) => {
            let config = DaemonConfig::load(path)?;
            config.apply(&registry)?
        }
        None => HashMap::new(),
    };
    info!(
        interfaces = ifaces.len(),
        trunks = registry.trunk_names().len(),
        "trunkd ready"
    );

    let handler = ControlHandler::new(registry, ifaces);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let response = handler.handle_line(&line);
        stdout
            .write_all(format!("{}\n", response.render()).as_bytes())
            .await?;
        stdout.flush().await?;
        if response == ControlResponse::Quit {
            break;
        }
    }
    info!("trunkd shutting down");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting trunkd ---");
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}
