//! Peak summary ingestion and the derived interval summary
//!
//! On success the external computation leaves a gzip-compressed
//! tab-separated summary of significant intervals in the data directory.
//! This module parses it, and derives the secondary interval-summary
//! artifact from the variant-catalog collaborator.

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::str::FromStr;

/// Fixed-name input table the phenotype data is serialized to
pub const INPUT_TABLE_FILE: &str = "df.tsv";

/// Fixed-name output summary the external computation produces
pub const PEAK_SUMMARY_FILE: &str = "peak_summary.tsv.gz";

/// Fixed-name derived interval-summary artifact
pub const INTERVAL_SUMMARY_FILE: &str = "interval_summary.tsv.gz";

/// A genomic interval in `chrom:start-end` notation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
}

impl FromStr for Interval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(['-', ':']).collect();
        if parts.len() != 3 {
            anyhow::bail!("Malformed interval: {}", s);
        }
        Ok(Self {
            chrom: parts[0].to_string(),
            start: parts[1]
                .parse()
                .with_context(|| format!("Invalid interval start: {}", s))?,
            end: parts[2]
                .parse()
                .with_context(|| format!("Invalid interval end: {}", s))?,
        })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// One row of the peak summary table
#[derive(Debug, Clone, PartialEq)]
pub struct PeakRow {
    pub interval: Interval,
    pub pos: i64,
    pub peak_log10p: f64,
    pub variance_explained: f64,
    pub trait_slug: String,
}

/// Parse the gzip-compressed peak summary table.
///
/// The header names the columns; `interval`, `POS`, `peak_log10p`,
/// `variance_explained` and `trait` are required, extra columns are
/// ignored.
pub fn read_peak_summary(path: &Path) -> Result<Vec<PeakRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    read_peak_rows(BufReader::new(GzDecoder::new(file)))
}

fn read_peak_rows<R: BufRead>(reader: R) -> Result<Vec<PeakRow>> {
    let mut lines = reader.lines();

    let header = lines
        .next()
        .context("Peak summary is empty")?
        .context("Failed to read peak summary header")?;
    let columns: HashMap<&str, usize> = header
        .trim_end()
        .split('\t')
        .enumerate()
        .map(|(i, name)| (name, i))
        .collect();

    let column = |name: &str| -> Result<usize> {
        columns
            .get(name)
            .copied()
            .with_context(|| format!("Peak summary missing column: {}", name))
    };
    let interval_col = column("interval")?;
    let pos_col = column("POS")?;
    let log10p_col = column("peak_log10p")?;
    let variance_col = column("variance_explained")?;
    let trait_col = column("trait")?;

    let mut rows = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = line.context("Failed to read peak summary line")?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.trim_end().split('\t').collect();

        rows.push(PeakRow {
            interval: field(&fields, interval_col, idx)?.parse()?,
            pos: field(&fields, pos_col, idx)?
                .parse()
                .with_context(|| format!("Row {}: invalid POS", idx + 1))?,
            peak_log10p: field(&fields, log10p_col, idx)?
                .parse()
                .with_context(|| format!("Row {}: invalid peak_log10p", idx + 1))?,
            variance_explained: field(&fields, variance_col, idx)?
                .parse()
                .with_context(|| format!("Row {}: invalid variance_explained", idx + 1))?,
            trait_slug: field(&fields, trait_col, idx)?.to_string(),
        });
    }

    Ok(rows)
}

fn field<'a>(fields: &[&'a str], col: usize, idx: usize) -> Result<&'a str> {
    fields
        .get(col)
        .copied()
        .with_context(|| format!("Row {}: missing column {}", idx + 1, col))
}

/// One row of the derived interval summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalSummaryRow {
    pub interval: String,
    /// Variant category the count applies to
    pub category: String,
    pub variants: i64,
}

/// Per-interval variant summaries, supplied by the variant-query
/// collaborator
#[async_trait]
pub trait VariantCatalog: Send + Sync {
    async fn interval_summary(&self, interval: &Interval) -> Result<Vec<IntervalSummaryRow>>;
}

/// Catalog used when no variant store is wired to the worker
pub struct NoVariantCatalog;

#[async_trait]
impl VariantCatalog for NoVariantCatalog {
    async fn interval_summary(&self, _interval: &Interval) -> Result<Vec<IntervalSummaryRow>> {
        Ok(Vec::new())
    }
}

/// Write the interval-summary artifact, sorted by interval then descending
/// variant count
pub fn write_interval_summary(path: &Path, rows: &[IntervalSummaryRow]) -> Result<()> {
    let mut rows: Vec<&IntervalSummaryRow> = rows.iter().collect();
    rows.sort_by(|a, b| {
        b.interval
            .cmp(&a.interval)
            .then(b.variants.cmp(&a.variants))
    });

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut encoder = GzEncoder::new(file, Compression::default());

    writeln!(encoder, "interval\tcategory\tvariants")?;
    for row in rows {
        writeln!(encoder, "{}\t{}\t{}", row.interval, row.category, row.variants)?;
    }
    encoder.finish().context("Failed to finish interval summary")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_interval_round_trip() {
        let interval: Interval = "II:5000-10000".parse().unwrap();
        assert_eq!(interval.chrom, "II");
        assert_eq!(interval.start, 5000);
        assert_eq!(interval.end, 10000);
        assert_eq!(interval.to_string(), "II:5000-10000");
    }

    #[test]
    fn test_malformed_interval() {
        assert!("II:5000".parse::<Interval>().is_err());
        assert!("II-5000-1-2".parse::<Interval>().is_err());
    }

    #[test]
    fn test_read_peak_rows() {
        let input = "interval\tCHROM\tPOS\tpeak_log10p\tvariance_explained\ttrait\n\
                     II:5000000-6000000\tII\t5500000\t7.31\t0.42\tsurvival-25c\n";
        let rows = read_peak_rows(Cursor::new(input)).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].interval.to_string(), "II:5000000-6000000");
        assert_eq!(rows[0].pos, 5_500_000);
        assert_eq!(rows[0].peak_log10p, 7.31);
        assert_eq!(rows[0].trait_slug, "survival-25c");
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let input = "interval\tPOS\ttrait\nII:1-2\t1\tx\n";
        assert!(read_peak_rows(Cursor::new(input)).is_err());
    }

    #[test]
    fn test_interval_summary_sorted_by_interval_then_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(INTERVAL_SUMMARY_FILE);

        let rows = vec![
            IntervalSummaryRow {
                interval: "I:1-100".into(),
                category: "missense".into(),
                variants: 3,
            },
            IntervalSummaryRow {
                interval: "II:1-100".into(),
                category: "intron".into(),
                variants: 9,
            },
            IntervalSummaryRow {
                interval: "I:1-100".into(),
                category: "stop_gained".into(),
                variants: 7,
            },
        ];
        write_interval_summary(&path, &rows).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let mut content = String::new();
        use std::io::Read;
        GzDecoder::new(file).read_to_string(&mut content).unwrap();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "interval\tcategory\tvariants");
        assert_eq!(lines[1], "II:1-100\tintron\t9");
        assert_eq!(lines[2], "I:1-100\tstop_gained\t7");
        assert_eq!(lines[3], "I:1-100\tmissense\t3");
    }
}
