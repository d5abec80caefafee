//! Homolog and ortholog loaders
//!
//! Two passes populate the homolog table on every build:
//!
//! 1. the homology-database pass, over the tab-delimited six-field dump
//!    linking genes across species through shared group ids, with species
//!    names resolved through the taxon-id table;
//! 2. the ortholog-file pass, over the tab-delimited file of 2-field gene
//!    headers followed by 4-field homolog detail lines.
//!
//! The ortholog parse is order-dependent: a detail line attaches to the most
//! recent preceding header, so the file is consumed in a single forward scan
//! with the current header carried as an explicit accumulator.

use crate::models::HomologRecord;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::BufRead;
use tracing::debug;

/// Source tag of homology-database rows
pub const HOMOLOGY_DB_SOURCE: &str = "Homologene";

// ============================================================================
// Taxon-id table
// ============================================================================

/// Taxon id → species name lookup
#[derive(Debug, Clone, Default)]
pub struct TaxonTable {
    names: HashMap<i64, String>,
}

impl TaxonTable {
    /// Parse the tab-delimited `(taxon_id, species_name)` table
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut names = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read taxon line")?;
            if line.trim().is_empty() {
                continue;
            }
            let (taxon, name) = line
                .split_once('\t')
                .with_context(|| format!("Line {}: expected 2 tab-delimited fields", idx + 1))?;
            let taxon: i64 = taxon
                .trim()
                .parse()
                .with_context(|| format!("Line {}: invalid taxon id: {}", idx + 1, taxon))?;
            names.insert(taxon, name.trim().to_string());
        }

        Ok(Self { names })
    }

    /// Species name for a taxon, falling back to the numeric id as text
    pub fn species_name(&self, taxon_id: i64) -> String {
        self.names
            .get(&taxon_id)
            .cloned()
            .unwrap_or_else(|| taxon_id.to_string())
    }
}

// ============================================================================
// Homology-database pass
// ============================================================================

struct HomologyDbRow {
    taxon_id: i64,
    gene_id: String,
    gene_symbol: String,
}

/// Parse the homology database dump into homolog rows.
///
/// Rows are `(group_id, taxon_id, gene_id, gene_symbol, protein_gi,
/// protein_accession)`; rows sharing a group id are homologs of each other.
/// Each reference-taxon member of a group yields one record per
/// non-reference member. Grouping requires the whole file, so this pass is
/// not streaming; group order follows first appearance in the file.
pub fn homology_db_records<R: BufRead>(
    reader: R,
    taxons: &TaxonTable,
    reference_taxon_id: i64,
) -> Result<Vec<HomologRecord>> {
    let mut group_order: Vec<i64> = Vec::new();
    let mut groups: HashMap<i64, Vec<HomologyDbRow>> = HashMap::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read homology line")?;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 4 {
            anyhow::bail!(
                "Line {}: expected at least 4 tab-delimited fields, got {}",
                idx + 1,
                fields.len()
            );
        }

        let group_id: i64 = fields[0]
            .parse()
            .with_context(|| format!("Line {}: invalid group id: {}", idx + 1, fields[0]))?;
        let taxon_id: i64 = fields[1]
            .parse()
            .with_context(|| format!("Line {}: invalid taxon id: {}", idx + 1, fields[1]))?;

        if !groups.contains_key(&group_id) {
            group_order.push(group_id);
        }
        groups.entry(group_id).or_default().push(HomologyDbRow {
            taxon_id,
            gene_id: fields[2].to_string(),
            gene_symbol: fields[3].to_string(),
        });
    }

    let mut records = Vec::new();
    for group_id in group_order {
        let rows = &groups[&group_id];
        for reference in rows.iter().filter(|r| r.taxon_id == reference_taxon_id) {
            for other in rows.iter().filter(|r| r.taxon_id != reference_taxon_id) {
                records.push(HomologRecord {
                    gene_id: reference.gene_id.clone(),
                    gene_name: reference.gene_symbol.clone(),
                    homolog_species: taxons.species_name(other.taxon_id),
                    homolog_taxon_id: Some(other.taxon_id),
                    homolog_gene: other.gene_symbol.clone(),
                    homolog_source: HOMOLOGY_DB_SOURCE.to_string(),
                    is_ortholog: false,
                });
            }
        }
    }

    debug!(records = records.len(), "Parsed homology database");
    Ok(records)
}

// ============================================================================
// Ortholog-file pass
// ============================================================================

/// Lazy stream of homolog records from the ortholog file
pub struct OrthologRecords<'a, R: BufRead> {
    lines: std::io::Lines<R>,
    line_num: usize,
    /// The most recently seen 2-field gene header
    current_gene: Option<(String, String)>,
    reference_species: &'a str,
}

/// Stream the ortholog file in a single forward scan.
///
/// `reference_species` is the canonical name compared (exact string match)
/// against each detail line's species field for `is_ortholog`.
pub fn ortholog_records<R: BufRead>(
    reader: R,
    reference_species: &str,
) -> OrthologRecords<'_, R> {
    OrthologRecords {
        lines: reader.lines(),
        line_num: 0,
        current_gene: None,
        reference_species,
    }
}

impl<R: BufRead> Iterator for OrthologRecords<'_, R> {
    type Item = Result<HomologRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e).context("Failed to read ortholog line")),
            };
            self.line_num += 1;

            let fields: Vec<&str> = line.split('\t').collect();
            match fields.len() {
                // Separator and comment lines
                0 | 1 => continue,
                // Gene header: carried forward until replaced
                2 => {
                    self.current_gene = Some((fields[0].to_string(), fields[1].to_string()));
                    continue;
                },
                3 => {
                    return Some(Err(anyhow::anyhow!(
                        "Line {}: detail line has 3 fields, expected 4",
                        self.line_num
                    )));
                },
                _ => {
                    let Some((gene_id, gene_name)) = self.current_gene.clone() else {
                        return Some(Err(anyhow::anyhow!(
                            "Line {}: detail line before any gene header",
                            self.line_num
                        )));
                    };
                    let species = fields[0].to_string();
                    return Some(Ok(HomologRecord {
                        gene_id,
                        gene_name,
                        is_ortholog: species == self.reference_species,
                        homolog_species: species,
                        homolog_taxon_id: None,
                        homolog_gene: fields[2].to_string(),
                        homolog_source: fields[3].to_string(),
                    }));
                },
            }
        }
    }
}
