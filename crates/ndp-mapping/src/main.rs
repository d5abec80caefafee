//! NDP mapping worker - Main entry point
//!
//! One process per trait. Job identity arrives through the
//! `NDP_REPORT_SLUG` / `NDP_TRAIT_SLUG` environment variables; everything
//! else is environment configuration.

use anyhow::{Context, Result};
use ndp_common::logging::{init_logging, LogConfig};
use ndp_common::storage::{Storage, StorageConfig};
use ndp_mapping::external::ExternalCommand;
use ndp_mapping::peaks::NoVariantCatalog;
use ndp_mapping::store::MappingStore;
use ndp_mapping::worker::{MappingWorker, WorkerConfig};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::error;

/// Environment variable carrying the report identifier
pub const REPORT_SLUG_ENV: &str = "NDP_REPORT_SLUG";

/// Environment variable carrying the trait identifier
pub const TRAIT_SLUG_ENV: &str = "NDP_TRAIT_SLUG";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let log_config = LogConfig::from_env().unwrap_or_default();
    let _ = init_logging(&log_config);

    if let Err(e) = run().await {
        error!(error = %e, "Worker failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let report_slug = std::env::var(REPORT_SLUG_ENV)
        .with_context(|| format!("{} is not set", REPORT_SLUG_ENV))?;
    let trait_slug = std::env::var(TRAIT_SLUG_ENV)
        .with_context(|| format!("{} is not set", TRAIT_SLUG_ENV))?;

    let store_path = PathBuf::from(
        std::env::var("NDP_MAPPING_DB").unwrap_or_else(|_| "mapping.db".to_string()),
    );
    let store = MappingStore::connect(&store_path).await?;
    store.ensure_schema().await?;

    let mut command = ExternalCommand::parse(
        &std::env::var("NDP_MAPPING_COMMAND")
            .unwrap_or_else(|_| "Rscript pipeline.R".to_string()),
    )?;
    if let Some(timeout) = std::env::var("NDP_MAPPING_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
    {
        command = command.with_timeout(Duration::from_secs(timeout));
    }

    let version_probe = std::env::var("NDP_TOOL_VERSION_PROBE")
        .ok()
        .map(|s| ExternalCommand::parse(&s))
        .transpose()?;

    let config = WorkerConfig {
        data_dir: PathBuf::from(std::env::var("NDP_DATA_DIR").unwrap_or_else(|_| "data".into())),
        command,
        version_probe,
    };

    let worker = match StorageConfig::from_env() {
        Some(storage_config) => {
            let s3 = Storage::new(storage_config).await?;
            MappingWorker::with_storage(store, config, Box::new(NoVariantCatalog), s3)
        },
        None => MappingWorker::new(store, config, Box::new(NoVariantCatalog)),
    };

    let status = worker.run(&report_slug, &trait_slug).await?;
    println!("{}/{}: {}", report_slug, trait_slug, status.as_str());
    Ok(())
}
