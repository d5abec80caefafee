//! Attribute-tagged annotation parser
//!
//! Builds the condensed gene summary table from the gzip-compressed
//! annotation file. Only lines carrying the expected provenance and
//! feature-type markers (case-sensitive substring screen) whose feature-type
//! column equals `gene` are kept; the ninth column's semicolon-delimited
//! `key=value` attributes supply the gene fields, of which a fixed whitelist
//! is retained (key match is case-insensitive). The combined
//! `id = "<type>:<value>"` attribute splits into `gene_id_type` / `gene_id`;
//! lines without an `id` are skipped, not errors.

use crate::genetics::{midpoint, ArmCenterTable, Chromosome};
use crate::models::GeneSummaryRecord;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Attribute keys retained from the annotation column
const RETAINED_KEYS: [&str; 4] = ["id", "biotype", "sequence_name", "locus"];

/// Line filter and attribute rules for the annotation file
#[derive(Debug, Clone)]
pub struct SummaryParser {
    provenance_marker: String,
    feature_marker: String,
}

impl SummaryParser {
    pub fn new(provenance_marker: impl Into<String>, feature_marker: impl Into<String>) -> Self {
        Self {
            provenance_marker: provenance_marker.into(),
            feature_marker: feature_marker.into(),
        }
    }

    /// Open a gzip-compressed annotation file for streaming
    pub fn open<'a>(
        &'a self,
        path: &Path,
        table: &'a ArmCenterTable,
    ) -> Result<SummaryRecords<'a, impl BufRead>> {
        let reader = super::open_gzip(path)?;
        Ok(self.records(reader, table))
    }

    /// Stream summary records from already-decompressed lines
    pub fn records<'a, R: BufRead>(
        &'a self,
        reader: R,
        table: &'a ArmCenterTable,
    ) -> SummaryRecords<'a, R> {
        SummaryRecords {
            lines: reader.lines(),
            line_num: 0,
            parser: self,
            table,
        }
    }

    /// Parse one line; `None` when the line is screened out or lacks an id
    fn parse_line(
        &self,
        line: &str,
        line_num: usize,
        table: &ArmCenterTable,
    ) -> Result<Option<GeneSummaryRecord>> {
        if !line.contains(&self.provenance_marker) || !line.contains(&self.feature_marker) {
            return Ok(None);
        }

        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < 9 {
            anyhow::bail!(
                "Line {}: expected 9 tab-delimited columns, got {}",
                line_num,
                fields.len()
            );
        }
        if fields[2] != self.feature_marker {
            return Ok(None);
        }

        let attrs: HashMap<String, String> = fields[8]
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_lowercase(), v.to_string()))
            .filter(|(k, _)| RETAINED_KEYS.contains(&k.as_str()))
            .collect();

        // Lines without a combined id field carry nothing to key on
        let Some(id) = attrs.get("id") else {
            return Ok(None);
        };
        let (gene_id_type, gene_id) = id
            .split_once(':')
            .with_context(|| format!("Line {}: malformed id field: {}", line_num, id))?;

        let chrom: Chromosome = fields[0]
            .parse()
            .with_context(|| format!("Line {}", line_num))?;
        let start: i64 = fields[3]
            .parse()
            .with_context(|| format!("Line {}: invalid start: {}", line_num, fields[3]))?;
        let end: i64 = fields[4]
            .parse()
            .with_context(|| format!("Line {}: invalid end: {}", line_num, fields[4]))?;

        Ok(Some(GeneSummaryRecord {
            gene_id: gene_id.to_string(),
            gene_id_type: gene_id_type.to_string(),
            locus: attrs.get("locus").cloned(),
            sequence_name: attrs.get("sequence_name").cloned(),
            biotype: attrs.get("biotype").cloned(),
            chrom: chrom.as_str().to_string(),
            chrom_num: chrom.number(),
            start,
            end,
            arm_or_center: table.classify(chrom, midpoint(start, end)),
        }))
    }
}

impl Default for SummaryParser {
    fn default() -> Self {
        Self::new("WormBase", "gene")
    }
}

/// Lazy stream of gene summary records
pub struct SummaryRecords<'a, R: BufRead> {
    lines: std::io::Lines<R>,
    line_num: usize,
    parser: &'a SummaryParser,
    table: &'a ArmCenterTable,
}

impl<R: BufRead> Iterator for SummaryRecords<'_, R> {
    type Item = Result<GeneSummaryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e).context("Failed to read annotation line")),
            };
            self.line_num += 1;

            match self.parser.parse_line(&line, self.line_num, self.table) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GENE_LINE: &str = "I\tWormBase\tgene\t4116\t10230\t.\t-\t.\tID=Gene:WBGene00022277;Name=WBGene00022277;sequence_name=Y74C9A.3;biotype=protein_coding;locus=homt-1";

    fn collect(input: &str) -> Vec<GeneSummaryRecord> {
        let parser = SummaryParser::default();
        let table = ArmCenterTable::default();
        parser
            .records(Cursor::new(input.to_string()), &table)
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_parse_gene_line() {
        let records = collect(GENE_LINE);
        assert_eq!(records.len(), 1);

        let gene = &records[0];
        assert_eq!(gene.gene_id, "WBGene00022277");
        assert_eq!(gene.gene_id_type, "Gene");
        assert_eq!(gene.locus.as_deref(), Some("homt-1"));
        assert_eq!(gene.sequence_name.as_deref(), Some("Y74C9A.3"));
        assert_eq!(gene.biotype.as_deref(), Some("protein_coding"));
        assert_eq!(gene.chrom, "I");
        assert_eq!(gene.chrom_num, 1);
    }

    #[test]
    fn test_skips_lines_without_markers() {
        // No provenance marker
        let foreign = "I\tensembl\tgene\t100\t200\t.\t+\t.\tID=Gene:WBGene00000001";
        assert!(collect(foreign).is_empty());

        // Provenance marker but a different feature type
        let mrna = "I\tWormBase\tmRNA\t4116\t10230\t.\t-\t.\tID=Transcript:Y74C9A.3.1;Parent=Gene:WBGene00022277";
        assert!(collect(mrna).is_empty());
    }

    #[test]
    fn test_skips_lines_without_id() {
        let no_id =
            "I\tWormBase\tgene\t4116\t10230\t.\t-\t.\tsequence_name=Y74C9A.3;biotype=protein_coding";
        assert!(collect(no_id).is_empty());
    }

    #[test]
    fn test_marker_match_is_case_sensitive() {
        let lowercase = GENE_LINE.replace("WormBase", "wormbase");
        assert!(collect(&lowercase).is_empty());
    }

    #[test]
    fn test_attribute_keys_match_case_insensitively() {
        let upper = "I\tWormBase\tgene\t4116\t10230\t.\t-\t.\tID=Gene:WBGene00022277;SEQUENCE_NAME=Y74C9A.3";
        let records = collect(upper);
        assert_eq!(records[0].sequence_name.as_deref(), Some("Y74C9A.3"));
    }

    #[test]
    fn test_unknown_chromosome_is_an_error() {
        let bad = GENE_LINE.replacen("I\t", "II-alt\t", 1);
        let parser = SummaryParser::default();
        let table = ArmCenterTable::default();
        let result: Result<Vec<_>> = parser.records(Cursor::new(bad), &table).collect();
        assert!(result.is_err());
    }
}
