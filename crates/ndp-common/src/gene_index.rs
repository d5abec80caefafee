//! Serialized gene-id → display-name lookup
//!
//! The ETL build writes this index as a JSON artifact after every successful
//! full build (it is a cache regenerated from the store, not a source of
//! truth). Query-time consumers load it once at process start and treat it
//! as read-only for the life of the process; the main consumer is the
//! variant-annotation path, which uses it to fill in a human-readable gene
//! name for the gene ids found in annotation payloads.

use crate::error::{NdpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// In-memory gene-id → display-name map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneIndex {
    names: HashMap<String, String>,
}

impl GeneIndex {
    /// Build an index from (gene_id, display_name) pairs
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            names: entries.into_iter().collect(),
        }
    }

    /// Load the index from its JSON artifact
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let names: HashMap<String, String> = serde_json::from_slice(&data)?;
        info!(genes = names.len(), path = %path.display(), "Loaded gene index");
        Ok(Self { names })
    }

    /// Persist the index as a JSON artifact, replacing any previous copy
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec(&self.names)?;
        fs::write(path, data)?;
        info!(genes = self.names.len(), path = %path.display(), "Wrote gene index");
        Ok(())
    }

    /// Resolve a stable gene id to its display name.
    ///
    /// Unknown identifiers resolve to absence, never an error.
    pub fn resolve(&self, gene_id: &str) -> Option<&str> {
        self.names.get(gene_id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Field order of a pipe-delimited variant annotation payload
const ANN_FIELDS: usize = 15;

/// One variant annotation record from an annotation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantAnnotation {
    pub allele: String,
    pub effect: String,
    pub impact: String,
    pub gene_name: Option<String>,
    pub gene_id: String,
    pub feature_type: String,
    pub feature_id: String,
    pub transcript_biotype: String,
}

impl VariantAnnotation {
    /// Parse one pipe-delimited annotation entry.
    ///
    /// Payload field order: allele, effect, impact, gene_name, gene_id,
    /// feature_type, feature_id, transcript_biotype, then positional detail
    /// fields this consumer does not retain.
    pub fn parse(entry: &str) -> Result<Self> {
        let mut fields = entry.split('|');
        let mut next = || fields.next().unwrap_or("").to_string();

        let allele = next();
        let effect = next();
        let impact = next();
        let gene_name = next();
        let gene_id = next();
        let feature_type = next();
        let feature_id = next();
        let transcript_biotype = next();

        if entry.split('|').count() > ANN_FIELDS {
            return Err(NdpError::Parse(format!(
                "Annotation entry has more than {} fields: {}",
                ANN_FIELDS, entry
            )));
        }

        Ok(Self {
            allele,
            effect,
            impact,
            gene_name: if gene_name.is_empty() { None } else { Some(gene_name) },
            gene_id,
            feature_type,
            feature_id,
            transcript_biotype,
        })
    }

    /// Fill in the display name for this annotation's gene id.
    ///
    /// The looked-up name replaces whatever the payload carried; an unknown
    /// gene id clears the name rather than leaving a stale value.
    pub fn enrich(&mut self, index: &GeneIndex) {
        self.gene_name = index.resolve(&self.gene_id).map(|s| s.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_index() -> GeneIndex {
        GeneIndex::from_entries([
            ("WBGene00003920".to_string(), "pot-2".to_string()),
            ("WBGene00022277".to_string(), "Y74C9A.3".to_string()),
        ])
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let index = sample_index();
        assert_eq!(index.resolve("WBGene00003920"), Some("pot-2"));
        assert_eq!(index.resolve("WBGene99999999"), None);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gene_index.json");

        let index = sample_index();
        index.save(&path).unwrap();

        let loaded = GeneIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.resolve("WBGene00022277"), Some("Y74C9A.3"));
    }

    #[test]
    fn test_annotation_enrich() {
        let index = sample_index();
        let entry = "T|missense_variant|MODERATE||WBGene00003920|transcript|F57C12.3.1|protein_coding||c.100A>T|p.Lys34Ter||||";
        let mut ann = VariantAnnotation::parse(entry).unwrap();
        assert_eq!(ann.gene_name, None);

        ann.enrich(&index);
        assert_eq!(ann.gene_name.as_deref(), Some("pot-2"));
    }

    #[test]
    fn test_annotation_enrich_unknown_gene_clears_name() {
        let index = sample_index();
        let mut ann = VariantAnnotation::parse("A|intron_variant|LOW|stale|WBGene11111111|||").unwrap();
        assert_eq!(ann.gene_name.as_deref(), Some("stale"));

        ann.enrich(&index);
        assert_eq!(ann.gene_name, None);
    }
}
