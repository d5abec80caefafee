//! Build configuration
//!
//! Env-var driven configuration with named defaults. The nested groups are
//! deliberate: each build flattens them into metadata rows using the
//! `"group/name"` key convention, so the published artifact records exactly
//! which configuration produced it.

use crate::models::MetadataRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default dataset release identifier (YYYYMMDD of the variant release).
pub const DEFAULT_DATASET_RELEASE: &str = "20260601";

/// Default portal version string recorded in build metadata.
pub const DEFAULT_PORTAL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default upstream annotation release (resolved per build by the CLI).
pub const DEFAULT_ANNOTATION_VERSION: &str = "WS276";

/// Canonical name of the reference species.
pub const DEFAULT_REFERENCE_SPECIES: &str = "Caenorhabditis elegans";

/// NCBI taxon id of the reference species.
pub const DEFAULT_REFERENCE_TAXON_ID: i64 = 6239;

const DEFAULT_UPSTREAM_BASE: &str =
    "https://downloads.wormbase.org/releases/current-production-release/species/c_elegans/PRJNA13758";

const DEFAULT_HOMOLOGY_BASE: &str = "https://ftp.ncbi.nlm.nih.gov/pub/HomoloGene/current";

/// Release identity group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    pub dataset_release: String,
    pub portal_version: String,
    pub annotation_version: String,
}

/// Upstream raw-input URL group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlConfig {
    /// Column-delimited (GTF-style) gene feature file, gzip
    pub gene_feature: String,
    /// Attribute-tagged (GFF-style) annotation file, gzip
    pub gene_annotation: String,
    /// Comma-delimited identifier cross-reference file, gzip
    pub gene_ids: String,
    /// Tab-delimited homology database dump
    pub homologene: String,
    /// Tab-delimited ortholog file
    pub orthologs: String,
    /// Tab-delimited taxon-id → species-name table
    pub taxon_ids: String,
}

/// Reference-species group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub reference_species: String,
    pub reference_taxon_id: i64,
}

/// Local filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Scratch directory for raw downloads
    pub download_dir: PathBuf,
    /// Directory the built artifact lands in
    pub output_dir: PathBuf,
    /// Fixed path of the serialized gene-name lookup index
    pub gene_index: PathBuf,
}

/// Full build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub release: ReleaseConfig,
    pub urls: UrlConfig,
    pub species: SpeciesConfig,
    pub paths: PathConfig,
    /// Strain-registry collaborator endpoint (TSV export)
    pub strain_registry_url: String,
}

impl BuildConfig {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            release: ReleaseConfig {
                dataset_release: env_or("NDP_DATASET_RELEASE", DEFAULT_DATASET_RELEASE),
                portal_version: env_or("NDP_PORTAL_VERSION", DEFAULT_PORTAL_VERSION),
                annotation_version: env_or("NDP_ANNOTATION_VERSION", DEFAULT_ANNOTATION_VERSION),
            },
            urls: UrlConfig {
                gene_feature: env_or(
                    "NDP_URL_GENE_FEATURE",
                    &format!("{}/c_elegans.PRJNA13758.canonical_geneset.gtf.gz", DEFAULT_UPSTREAM_BASE),
                ),
                gene_annotation: env_or(
                    "NDP_URL_GENE_ANNOTATION",
                    &format!("{}/c_elegans.PRJNA13758.annotations.gff3.gz", DEFAULT_UPSTREAM_BASE),
                ),
                gene_ids: env_or(
                    "NDP_URL_GENE_IDS",
                    &format!("{}/c_elegans.PRJNA13758.geneIDs.txt.gz", DEFAULT_UPSTREAM_BASE),
                ),
                homologene: env_or(
                    "NDP_URL_HOMOLOGENE",
                    &format!("{}/homologene.data", DEFAULT_HOMOLOGY_BASE),
                ),
                orthologs: env_or(
                    "NDP_URL_ORTHOLOGS",
                    &format!("{}/c_elegans.PRJNA13758.orthologs.txt", DEFAULT_UPSTREAM_BASE),
                ),
                taxon_ids: env_or(
                    "NDP_URL_TAXON_IDS",
                    &format!("{}/taxid_taxname", DEFAULT_HOMOLOGY_BASE),
                ),
            },
            species: SpeciesConfig {
                reference_species: env_or("NDP_REFERENCE_SPECIES", DEFAULT_REFERENCE_SPECIES),
                reference_taxon_id: std::env::var("NDP_REFERENCE_TAXON_ID")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_REFERENCE_TAXON_ID),
            },
            paths: PathConfig {
                download_dir: PathBuf::from(env_or("NDP_DOWNLOAD_DIR", ".download")),
                output_dir: PathBuf::from(env_or("NDP_OUTPUT_DIR", "data")),
                gene_index: PathBuf::from(env_or("NDP_GENE_INDEX", "data/gene_index.json")),
            },
            strain_registry_url: env_or(
                "NDP_STRAIN_REGISTRY_URL",
                "https://registry.example.org/strains.tsv",
            ),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.release.dataset_release.is_empty() {
            anyhow::bail!("Dataset release cannot be empty");
        }
        if self.strain_registry_url.is_empty() {
            anyhow::bail!("Strain registry URL cannot be empty");
        }
        for (name, url) in [
            ("gene_feature", &self.urls.gene_feature),
            ("gene_annotation", &self.urls.gene_annotation),
            ("gene_ids", &self.urls.gene_ids),
            ("homologene", &self.urls.homologene),
            ("orthologs", &self.urls.orthologs),
            ("taxon_ids", &self.urls.taxon_ids),
        ] {
            if url.is_empty() {
                anyhow::bail!("Upstream URL '{}' cannot be empty", name);
            }
        }
        Ok(())
    }

    /// Basename of the versioned database artifact
    pub fn db_basename(&self, version: &str) -> String {
        format!("ndp.{}.{}.db", self.release.dataset_release, version)
    }

    /// Local path of the versioned database artifact
    pub fn db_path(&self, version: &str) -> PathBuf {
        self.paths.output_dir.join(self.db_basename(version))
    }

    /// Flatten every scalar config attribute into metadata rows using the
    /// `"group/name"` key convention.
    pub fn flatten(&self) -> Vec<MetadataRecord> {
        vec![
            MetadataRecord::new("release/dataset_release", &self.release.dataset_release),
            MetadataRecord::new("release/portal_version", &self.release.portal_version),
            MetadataRecord::new("release/annotation_version", &self.release.annotation_version),
            MetadataRecord::new("urls/gene_feature", &self.urls.gene_feature),
            MetadataRecord::new("urls/gene_annotation", &self.urls.gene_annotation),
            MetadataRecord::new("urls/gene_ids", &self.urls.gene_ids),
            MetadataRecord::new("urls/homologene", &self.urls.homologene),
            MetadataRecord::new("urls/orthologs", &self.urls.orthologs),
            MetadataRecord::new("urls/taxon_ids", &self.urls.taxon_ids),
            MetadataRecord::new("species/reference_species", &self.species.reference_species),
            MetadataRecord::new(
                "species/reference_taxon_id",
                self.species.reference_taxon_id.to_string(),
            ),
            MetadataRecord::new("strain_registry/url", &self.strain_registry_url),
        ]
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BuildConfig {
        BuildConfig {
            release: ReleaseConfig {
                dataset_release: "20260601".into(),
                portal_version: "0.1.0".into(),
                annotation_version: "WS276".into(),
            },
            urls: UrlConfig {
                gene_feature: "http://x/geneset.gtf.gz".into(),
                gene_annotation: "http://x/annotations.gff3.gz".into(),
                gene_ids: "http://x/geneIDs.txt.gz".into(),
                homologene: "http://x/homologene.data".into(),
                orthologs: "http://x/orthologs.txt".into(),
                taxon_ids: "http://x/taxid_taxname".into(),
            },
            species: SpeciesConfig {
                reference_species: DEFAULT_REFERENCE_SPECIES.into(),
                reference_taxon_id: DEFAULT_REFERENCE_TAXON_ID,
            },
            paths: PathConfig {
                download_dir: ".download".into(),
                output_dir: "data".into(),
                gene_index: "data/gene_index.json".into(),
            },
            strain_registry_url: "http://x/strains.tsv".into(),
        }
    }

    #[test]
    fn test_db_basename() {
        let config = test_config();
        assert_eq!(config.db_basename("TEST1"), "ndp.20260601.TEST1.db");
    }

    #[test]
    fn test_flatten_uses_group_key_convention() {
        let config = test_config();
        let rows = config.flatten();

        assert!(rows.iter().all(|r| r.key.contains('/')));
        let release = rows
            .iter()
            .find(|r| r.key == "release/dataset_release")
            .unwrap();
        assert_eq!(release.value, "20260601");
        let taxon = rows
            .iter()
            .find(|r| r.key == "species/reference_taxon_id")
            .unwrap();
        assert_eq!(taxon.value, "6239");
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let mut config = test_config();
        config.urls.orthologs = String::new();
        assert!(config.validate().is_err());
    }
}
