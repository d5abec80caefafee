//! Mapping job state machine
//!
//! One worker per trait drives `queue → running → complete | error`.
//! Everything that can go wrong while running is caught and recorded on the
//! trait; callers observe the final `status` field, never a propagated
//! panic. Whatever the outcome, `completed_on` is stamped exactly once and
//! the trait is persisted by the unconditional final step.

use crate::external::{self, ExternalCommand};
use crate::models::{MappingResult, TraitRecord, TraitStatus};
use crate::peaks::{
    self, VariantCatalog, INPUT_TABLE_FILE, INTERVAL_SUMMARY_FILE, PEAK_SUMMARY_FILE,
};
use crate::store::MappingStore;
use anyhow::{Context, Result};
use chrono::Utc;
use ndp_common::storage::Storage;
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info};
use uuid::Uuid;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Working data directory; the input table is written here and result
    /// files are collected from here
    pub data_dir: PathBuf,
    /// The external statistical computation
    pub command: ExternalCommand,
    /// Optional command probing the external tool's version
    pub version_probe: Option<ExternalCommand>,
}

/// The mapping job state machine
pub struct MappingWorker {
    store: MappingStore,
    config: WorkerConfig,
    catalog: Box<dyn VariantCatalog>,
    s3: Option<Storage>,
}

impl MappingWorker {
    pub fn new(store: MappingStore, config: WorkerConfig, catalog: Box<dyn VariantCatalog>) -> Self {
        Self {
            store,
            config,
            catalog,
            s3: None,
        }
    }

    /// Create a worker that uploads its run output to object storage
    pub fn with_storage(
        store: MappingStore,
        config: WorkerConfig,
        catalog: Box<dyn VariantCatalog>,
        s3: Storage,
    ) -> Self {
        Self {
            store,
            config,
            catalog,
            s3: Some(s3),
        }
    }

    /// Run the job for one trait to its terminal state.
    ///
    /// Errors from this function are store failures around the lifecycle
    /// itself; computation failures surface as `TraitStatus::Error` on the
    /// returned status, not as `Err`.
    pub async fn run(&self, report_slug: &str, trait_slug: &str) -> Result<TraitStatus> {
        info!(report = %report_slug, trait_slug = %trait_slug, "Fetching task");
        let mut trait_rec = self.store.load_trait(report_slug, trait_slug).await?;

        match self.execute(&mut trait_rec).await {
            Ok(()) => {
                trait_rec.status = TraitStatus::Complete;
            },
            Err(e) => {
                error!(error = %format!("{:#}", e), "Mapping job failed");
                trait_rec.error_message = Some(e.to_string());
                trait_rec.error_traceback = Some(format!("{:#}", e));
                trait_rec.status = TraitStatus::Error;
            },
        }

        // Unconditional: stamp completion exactly once and persist the
        // terminal state, whatever happened above.
        trait_rec.completed_on = Some(Utc::now());
        self.store.save_trait(&trait_rec).await?;

        info!(
            report = %report_slug,
            trait_slug = %trait_slug,
            status = %trait_rec.status.as_str(),
            "Mapping job finished"
        );
        Ok(trait_rec.status)
    }

    /// The fallible body of a run; every error lands in the trait's error
    /// fields via the caller.
    async fn execute(&self, trait_rec: &mut TraitRecord) -> Result<()> {
        // queue → running
        trait_rec.started_on = Some(Utc::now());
        if let Some(probe) = &self.config.version_probe {
            trait_rec.tool_version = external::probe_tool_version(probe).await;
        }
        trait_rec.task_metadata = external::execution_metadata();

        std::fs::create_dir_all(&self.config.data_dir)
            .with_context(|| format!("Failed to create {}", self.config.data_dir.display()))?;
        self.write_input_table(trait_rec)?;

        trait_rec.status = TraitStatus::Running;
        self.store.save_trait(trait_rec).await?;

        // running → complete | error
        let result = self
            .config
            .command
            .run(&self.config.data_dir, &self.config.data_dir)
            .await?;
        if !result.success() {
            anyhow::bail!("External computation exited with code {}", result.exit_code);
        }

        let peak_path = self.config.data_dir.join(PEAK_SUMMARY_FILE);
        if peak_path.exists() {
            trait_rec.is_significant = Some(true);
            self.ingest_peaks(trait_rec, &peak_path).await?;
        } else {
            info!("No peak summary produced; trait is not significant");
            trait_rec.is_significant = Some(false);
        }

        self.upload_data_dir(trait_rec).await?;
        Ok(())
    }

    /// Serialize the phenotype table to the fixed-name input file, flushed
    /// before the subprocess may launch
    fn write_input_table(&self, trait_rec: &TraitRecord) -> Result<()> {
        let path = self.config.data_dir.join(INPUT_TABLE_FILE);
        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(trait_rec.trait_data.as_bytes())?;
        file.sync_all()
            .with_context(|| format!("Failed to flush {}", path.display()))?;
        Ok(())
    }

    /// Upsert one mapping result per discovered interval and derive the
    /// interval-summary artifact
    async fn ingest_peaks(&self, trait_rec: &TraitRecord, peak_path: &std::path::Path) -> Result<()> {
        let peaks = peaks::read_peak_summary(peak_path)?;
        info!(peaks = peaks.len(), "Ingesting significant intervals");

        let mappings: Vec<MappingResult> = peaks
            .iter()
            .map(|p| MappingResult {
                id: Uuid::new_v4().simple().to_string(),
                chrom: p.interval.chrom.clone(),
                pos: p.pos,
                interval_start: p.interval.start,
                interval_end: p.interval.end,
                log10p: p.peak_log10p,
                variance_explained: p.variance_explained,
                report_slug: trait_rec.report_slug.clone(),
                trait_slug: trait_rec.trait_slug.clone(),
                is_public: trait_rec.is_public,
            })
            .collect();
        self.store.record_mappings(&mappings).await?;

        let mut summary_rows = Vec::new();
        for peak in &peaks {
            summary_rows.extend(self.catalog.interval_summary(&peak.interval).await?);
        }
        peaks::write_interval_summary(
            &self.config.data_dir.join(INTERVAL_SUMMARY_FILE),
            &summary_rows,
        )?;

        Ok(())
    }

    /// Upload every file in the data directory, keyed by report and trait
    async fn upload_data_dir(&self, trait_rec: &TraitRecord) -> Result<()> {
        let Some(s3) = &self.s3 else {
            return Ok(());
        };

        let entries = std::fs::read_dir(&self.config.data_dir)
            .with_context(|| format!("Failed to list {}", self.config.data_dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let key = Storage::report_key(&trait_rec.report_slug, &trait_rec.trait_slug, filename);
            s3.upload_file(&key, &path).await?;
        }
        Ok(())
    }
}
