//! Database build orchestrator
//!
//! Drives a full build: download the raw release files, create the schema,
//! bulk-load strains, metadata, genes and homologs in dependency order,
//! publish the versioned snapshot, and regenerate the gene-name lookup
//! index. Any step failure aborts the build before publication, so the
//! previously published artifact stays live until a build runs all the way
//! through.

use crate::annotation::{feature_table, gene_ids::GeneIdResolver, summary::SummaryParser};
use crate::config::BuildConfig;
use crate::db::BuildDb;
use crate::download::{download_all, download_fname};
use crate::genetics::ArmCenterTable;
use crate::homology;
use crate::models::MetadataRecord;
use crate::strains::StrainSource;
use anyhow::{Context, Result};
use chrono::Utc;
use ndp_common::gene_index::GeneIndex;
use ndp_common::storage::Storage;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Local paths of the six downloaded raw inputs
#[derive(Debug, Clone)]
pub struct RawInputs {
    pub feature_table: PathBuf,
    pub annotation: PathBuf,
    pub gene_ids: PathBuf,
    pub homologene: PathBuf,
    pub orthologs: PathBuf,
    pub taxon_ids: PathBuf,
}

impl RawInputs {
    /// Raw-input paths as they land in the scratch directory
    pub fn in_dir(config: &BuildConfig, dir: &Path) -> Self {
        Self {
            feature_table: download_fname(dir, &config.urls.gene_feature),
            annotation: download_fname(dir, &config.urls.gene_annotation),
            gene_ids: download_fname(dir, &config.urls.gene_ids),
            homologene: download_fname(dir, &config.urls.homologene),
            orthologs: download_fname(dir, &config.urls.orthologs),
            taxon_ids: download_fname(dir, &config.urls.taxon_ids),
        }
    }
}

/// What a build produced
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub db_path: PathBuf,
    pub basename: String,
    pub strains: u64,
    pub metadata_rows: u64,
    pub gene_summaries: u64,
    pub genes: u64,
    pub homologs: u64,
    pub published: bool,
}

/// The build pipeline
pub struct BuildPipeline {
    config: BuildConfig,
    arm_center: ArmCenterTable,
    strain_source: Box<dyn StrainSource>,
    s3: Option<Storage>,
}

impl BuildPipeline {
    pub fn new(config: BuildConfig, strain_source: Box<dyn StrainSource>) -> Self {
        Self {
            config,
            arm_center: ArmCenterTable::default(),
            strain_source,
            s3: None,
        }
    }

    /// Create a pipeline that publishes to object storage
    pub fn with_storage(
        config: BuildConfig,
        strain_source: Box<dyn StrainSource>,
        s3: Storage,
    ) -> Self {
        Self {
            config,
            arm_center: ArmCenterTable::default(),
            strain_source,
            s3: Some(s3),
        }
    }

    /// Run a build for the given upstream annotation version.
    ///
    /// `strain_only` resets and reloads just the strain table; a full build
    /// replaces the whole snapshot.
    pub async fn build(&self, version: &str, strain_only: bool) -> Result<BuildOutcome> {
        if strain_only {
            return self.run(version, None).await;
        }

        let db_path = self.config.db_path(version);
        if db_path.exists() {
            info!(path = %db_path.display(), "Removing stale build artifact");
            std::fs::remove_file(&db_path)
                .with_context(|| format!("Failed to remove {}", db_path.display()))?;
        }

        info!("Downloading raw inputs");
        let urls = [
            self.config.urls.gene_feature.as_str(),
            self.config.urls.gene_annotation.as_str(),
            self.config.urls.gene_ids.as_str(),
            self.config.urls.homologene.as_str(),
            self.config.urls.orthologs.as_str(),
            self.config.urls.taxon_ids.as_str(),
        ];
        download_all(&urls, &self.config.paths.download_dir)
            .await
            .context("Raw input download failed")?;

        let inputs = RawInputs::in_dir(&self.config, &self.config.paths.download_dir);
        self.run(version, Some(&inputs)).await
    }

    /// Run the load phases over already-downloaded inputs.
    ///
    /// `inputs: None` is the strain-only mode.
    pub async fn run(&self, version: &str, inputs: Option<&RawInputs>) -> Result<BuildOutcome> {
        let start = Utc::now();
        let basename = self.config.db_basename(version);
        let db_path = self.config.db_path(version);
        info!(version = %version, artifact = %basename, "Initializing database");

        std::fs::create_dir_all(&self.config.paths.output_dir)
            .with_context(|| format!("Failed to create {}", self.config.paths.output_dir.display()))?;
        if inputs.is_some() && db_path.exists() {
            std::fs::remove_file(&db_path)
                .with_context(|| format!("Failed to remove {}", db_path.display()))?;
        }

        let db = BuildDb::connect(&db_path).await?;
        match inputs {
            Some(_) => db.create_full_schema().await?,
            None => db.reset_strain_table().await?,
        }

        // Strain catalog load is common to both modes
        info!("Loading strains");
        let strains = self
            .strain_source
            .fetch_strains()
            .await
            .context("Strain registry fetch failed")?;
        let strain_count = db.insert_strains(&strains).await?;
        info!(strains = strain_count, "Inserted strains");

        let Some(inputs) = inputs else {
            db.close().await;
            info!("Finished loading strains");
            return Ok(BuildOutcome {
                db_path,
                basename,
                strains: strain_count,
                metadata_rows: 0,
                gene_summaries: 0,
                genes: 0,
                homologs: 0,
                published: false,
            });
        };

        // Build metadata
        info!("Inserting metadata");
        let mut metadata = self.config.flatten();
        metadata.push(MetadataRecord::new("build/version", version));
        metadata.push(MetadataRecord::new("build/date", start.to_rfc3339()));
        let metadata_rows = db.insert_metadata(&metadata).await?;

        // Gene summary table from the attribute-tagged annotation file
        info!("Loading summary gene table");
        let summary_parser = SummaryParser::default();
        let summaries = summary_parser.open(&inputs.annotation, &self.arm_center)?;
        let gene_summaries = db.insert_gene_summaries(summaries).await?;
        info!(rows = gene_summaries, "Inserted gene summaries");

        // Gene table from the column-delimited feature file, joined with the
        // identifier resolver for locus names
        info!("Loading gene table");
        let resolver = GeneIdResolver::from_path(&inputs.gene_ids)?;
        let genes_iter = feature_table::open(&inputs.feature_table, &resolver, &self.arm_center)?;
        let genes = db.insert_genes(genes_iter).await?;
        info!(rows = genes, "Inserted genes");

        for (feature, count) in db.feature_counts().await? {
            info!(feature = %feature, count = count, "Gene summary");
        }

        // Homolog passes: homology database first, then the ortholog file;
        // each pass commits before the next starts
        info!("Loading homologs from homology database");
        let taxons = homology::TaxonTable::from_reader(open_text(&inputs.taxon_ids)?)?;
        let homologene = homology::homology_db_records(
            open_text(&inputs.homologene)?,
            &taxons,
            self.config.species.reference_taxon_id,
        )?;
        let mut homolog_count = db.insert_homologs(&homologene).await?;

        info!("Loading orthologs");
        let orthologs: Vec<_> = homology::ortholog_records(
            open_text(&inputs.orthologs)?,
            &self.config.species.reference_species,
        )
        .collect::<Result<_>>()?;
        homolog_count += db.insert_homologs(&orthologs).await?;
        info!(rows = homolog_count, "Inserted homologs");

        // Read the display names out before the pool closes; the index is
        // only written after a successful publish step.
        let display_names = db.gene_display_names().await?;
        db.close().await;

        // Publish the artifact
        let published = match &self.s3 {
            Some(s3) => {
                info!(artifact = %basename, "Uploading database");
                s3.upload_file(&Storage::db_archive_key(&basename), &db_path)
                    .await
                    .context("Artifact upload failed")?;
                true
            },
            None => {
                warn!("No object storage configured; skipping publish");
                false
            },
        };

        // Regenerate the gene-name lookup index
        let index = GeneIndex::from_entries(display_names);
        index
            .save(&self.config.paths.gene_index)
            .context("Failed to write gene index")?;

        let elapsed = (Utc::now() - start).num_seconds();
        info!(seconds = elapsed, artifact = %basename, "Build complete");

        Ok(BuildOutcome {
            db_path,
            basename,
            strains: strain_count,
            metadata_rows,
            gene_summaries,
            genes,
            homologs: homolog_count,
            published,
        })
    }

    /// Fetch the latest published snapshot for serving
    pub async fn download_latest(&self, version: &str) -> Result<PathBuf> {
        let s3 = self
            .s3
            .as_ref()
            .context("No object storage configured")?;

        let basename = self.config.db_basename(version);
        let data = s3.download(&Storage::db_latest_key(&basename)).await?;

        std::fs::create_dir_all(&self.config.paths.output_dir)?;
        let dest = self.config.paths.output_dir.join(&basename);
        std::fs::write(&dest, data)
            .with_context(|| format!("Failed to write {}", dest.display()))?;

        info!(path = %dest.display(), "Fetched latest database");
        Ok(dest)
    }
}

fn open_text(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}
