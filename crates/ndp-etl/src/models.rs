//! Build-time record types
//!
//! Rows produced by the parsers and bulk-loaded into the store. All of them
//! are replaced wholesale on each rebuild; nothing here is updated in place.

use crate::genetics::ArmOrCenter;
use serde::{Deserialize, Serialize};

/// One row of the gene table, from the column-delimited feature file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneRecord {
    /// Stable gene identifier (e.g. "WBGene00003920")
    pub gene_id: String,
    /// Human-readable locus name, when the identifier file knows one
    pub locus: Option<String>,
    /// Sequence/transcript name (e.g. "F57C12.3")
    pub sequence_name: Option<String>,
    pub biotype: Option<String>,
    pub chrom: String,
    pub chrom_num: i64,
    pub start: i64,
    pub end: i64,
    /// Feature midpoint
    pub pos: i64,
    pub arm_or_center: ArmOrCenter,
    /// Feature type of the source row (gene, transcript, exon, ...)
    pub feature: String,
}

/// Condensed per-gene projection, from the attribute-tagged annotation file
///
/// Keyed by `gene_id`; this is the table the gene-name lookup index is
/// generated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneSummaryRecord {
    pub gene_id: String,
    /// Identifier namespace from the combined id field (e.g. "Gene")
    pub gene_id_type: String,
    pub locus: Option<String>,
    pub sequence_name: Option<String>,
    pub biotype: Option<String>,
    pub chrom: String,
    pub chrom_num: i64,
    pub start: i64,
    pub end: i64,
    pub arm_or_center: ArmOrCenter,
}

impl GeneSummaryRecord {
    /// Preferred display name: locus if present, else sequence name
    pub fn display_name(&self) -> Option<&str> {
        self.locus
            .as_deref()
            .or(self.sequence_name.as_deref())
    }
}

/// Cross-species homology row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomologRecord {
    pub gene_id: String,
    pub gene_name: String,
    pub homolog_species: String,
    pub homolog_taxon_id: Option<i64>,
    pub homolog_gene: String,
    pub homolog_source: String,
    /// True exactly when the species matches the reference species
    pub is_ortholog: bool,
}

/// Flat key-value build metadata row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub key: String,
    pub value: String,
}

impl MetadataRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One strain from the external strain registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrainRecord {
    pub strain: String,
    /// Isotype group the strain collapses into for variant calling
    pub isotype: Option<String>,
    pub release: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub reference_strain: bool,
}
