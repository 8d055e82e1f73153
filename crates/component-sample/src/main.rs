//! # Component Sample
//!
//! Starts the sample service described by a TOML file and keeps it running
//! until Ctrl-C.
//!
//! ```bash
//! RUST_LOG=info cargo run -p component-sample -- --config crates/component-sample/service.toml --print-graph
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use component_framework::tracing::setup_tracing;
use component_sample::grpc::GrpcClientFactory;
use component_sample::service;
use component_sample::statistics::StatisticsStorage;
use component_sample::ServiceConfig;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "component-sample")]
#[command(about = "Sample service assembled from dependency-ordered components")]
#[command(version)]
struct Args {
    #[arg(short, long, default_value = "service.toml", help = "Path to TOML configuration file")]
    config: PathBuf,

    #[arg(long, help = "Print the component dependency graph after startup")]
    print_graph: bool,

    #[arg(long, help = "Stop right after a successful start instead of waiting for Ctrl-C")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing();

    let config = ServiceConfig::load_from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let mut manager = service::manager(&config).context("invalid component list")?;

    info!(components = ?manager.component_names().collect::<Vec<_>>(), "Starting service");
    if let Err(e) = manager.start().await {
        error!(error = %e, "Service failed to start");
        manager.stop().await;
        return Err(e).context("service failed to start");
    }

    if args.print_graph {
        print!("{}", manager.dependency_graph());
    }

    if let Some(factory) = manager.find::<GrpcClientFactory>() {
        let client = factory.make_client("self", "localhost:8080")?;
        info!(client = %client.name, channels = client.channels.len(), "Sample client ready");
    }

    if !args.once {
        info!("Service started, press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
    }

    if let Some(statistics) = manager.find::<StatisticsStorage>() {
        info!(metrics = %statistics.metrics().dump_metrics(), "Final metrics");
    }
    manager.stop().await;
    info!("Service stopped");
    Ok(())
}
