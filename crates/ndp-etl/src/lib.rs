//! NDP ETL Library
//!
//! Builds the portal's queryable store from upstream genome-annotation and
//! homology releases. The pipeline downloads the raw release files, parses
//! them into normalized records, bulk-loads a versioned SQLite snapshot, and
//! publishes the artifact together with the derived gene-name lookup index.
//!
//! # Example
//!
//! ```no_run
//! use ndp_etl::config::BuildConfig;
//! use ndp_etl::pipeline::BuildPipeline;
//! use ndp_etl::strains::HttpStrainRegistry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BuildConfig::load()?;
//!     let registry = HttpStrainRegistry::new(config.strain_registry_url.clone());
//!     let pipeline = BuildPipeline::new(config, Box::new(registry));
//!     pipeline.build("WS276", false).await?;
//!     Ok(())
//! }
//! ```

pub mod annotation;
pub mod config;
pub mod db;
pub mod download;
pub mod genetics;
pub mod homology;
pub mod models;
pub mod pipeline;
pub mod strains;
