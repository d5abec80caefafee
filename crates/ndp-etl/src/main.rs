//! NDP ETL - Main entry point

use clap::{Parser, Subcommand};
use ndp_common::logging::{init_logging, LogConfig};
use ndp_common::storage::{Storage, StorageConfig};
use ndp_etl::config::BuildConfig;
use ndp_etl::pipeline::BuildPipeline;
use ndp_etl::strains::HttpStrainRegistry;
use std::process;
use tracing::error;

#[derive(Parser)]
#[command(name = "ndp-etl", about = "NDP database build pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the versioned database snapshot
    Build {
        /// Upstream annotation version (e.g. WS276)
        version: String,
        /// Reset and reload only the strain table
        #[arg(long)]
        strain_only: bool,
    },
    /// Fetch the latest published snapshot for serving
    FetchDb {
        /// Upstream annotation version (e.g. WS276)
        version: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env().unwrap_or_default();
    let _ = init_logging(&log_config);

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = BuildConfig::load()?;

    let s3 = match StorageConfig::from_env() {
        Some(storage_config) => Some(Storage::new(storage_config).await?),
        None => None,
    };

    let registry = HttpStrainRegistry::new(config.strain_registry_url.clone());
    let pipeline = match s3 {
        Some(s3) => BuildPipeline::with_storage(config, Box::new(registry), s3),
        None => BuildPipeline::new(config, Box::new(registry)),
    };

    match cli.command {
        Commands::Build {
            version,
            strain_only,
        } => {
            let outcome = pipeline.build(&version, strain_only).await?;
            println!(
                "Built {} ({} strains, {} genes, {} homologs{})",
                outcome.basename,
                outcome.strains,
                outcome.genes,
                outcome.homologs,
                if outcome.published { ", published" } else { "" }
            );
        },
        Commands::FetchDb { version } => {
            let path = pipeline.download_latest(&version).await?;
            println!("Fetched {}", path.display());
        },
    }

    Ok(())
}
