//! Gene annotation parsers
//!
//! Two upstream formats feed the gene tables:
//!
//! - the column-delimited feature file (GTF-style), one row per feature,
//!   parsed by [`feature_table`] into [`crate::models::GeneRecord`]s
//! - the attribute-tagged annotation file (GFF-style), filtered to gene
//!   lines, parsed by [`summary`] into
//!   [`crate::models::GeneSummaryRecord`]s
//!
//! plus the comma-delimited identifier cross-reference file behind
//! [`gene_ids::GeneIdResolver`].

pub mod feature_table;
pub mod gene_ids;
pub mod summary;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Open a gzip-compressed file for buffered line reading
pub(crate) fn open_gzip(path: &Path) -> Result<BufReader<GzDecoder<File>>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(GzDecoder::new(file)))
}
