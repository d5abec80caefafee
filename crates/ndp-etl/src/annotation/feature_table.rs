//! Column-delimited gene feature parser
//!
//! Parses the gzip-compressed feature table (nine tab-separated columns:
//! seqname, source, feature, start, end, score, strand, frame, attributes;
//! attribute column in `key "value";` form) into [`GeneRecord`]s. The
//! sequence-name column becomes `chrom`, and the derived `chrom_num`, `pos`
//! and `arm_or_center` fields are computed per row. An unrecognized
//! chromosome token aborts the parse; that is a data error, not something to
//! skip past.

use crate::annotation::gene_ids::GeneIdResolver;
use crate::genetics::{midpoint, ArmCenterTable, Chromosome};
use crate::models::GeneRecord;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Lazy stream of gene records from a feature table
pub struct GeneRecords<'a, R: BufRead> {
    lines: std::io::Lines<R>,
    line_num: usize,
    resolver: &'a GeneIdResolver,
    table: &'a ArmCenterTable,
}

impl<'a, R: BufRead> GeneRecords<'a, R> {
    pub fn new(reader: R, resolver: &'a GeneIdResolver, table: &'a ArmCenterTable) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
            resolver,
            table,
        }
    }
}

/// Open a gzip-compressed feature table for streaming
pub fn open<'a>(
    path: &Path,
    resolver: &'a GeneIdResolver,
    table: &'a ArmCenterTable,
) -> Result<GeneRecords<'a, impl BufRead>> {
    let reader = super::open_gzip(path)?;
    Ok(GeneRecords::new(reader, resolver, table))
}

impl<R: BufRead> Iterator for GeneRecords<'_, R> {
    type Item = Result<GeneRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e).context("Failed to read feature line")),
            };
            self.line_num += 1;

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            return Some(parse_line(&line, self.line_num, self.resolver, self.table));
        }
    }
}

fn parse_line(
    line: &str,
    line_num: usize,
    resolver: &GeneIdResolver,
    table: &ArmCenterTable,
) -> Result<GeneRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 9 {
        anyhow::bail!(
            "Line {}: expected 9 tab-delimited columns, got {}",
            line_num,
            fields.len()
        );
    }

    let chrom: Chromosome = fields[0]
        .parse()
        .with_context(|| format!("Line {}", line_num))?;

    let start: i64 = fields[3]
        .parse()
        .with_context(|| format!("Line {}: invalid start: {}", line_num, fields[3]))?;
    let end: i64 = fields[4]
        .parse()
        .with_context(|| format!("Line {}: invalid end: {}", line_num, fields[4]))?;
    if start > end {
        anyhow::bail!("Line {}: start {} exceeds end {}", line_num, start, end);
    }

    let attrs = parse_attributes(fields[8]);
    let gene_id = attrs
        .get("gene_id")
        .with_context(|| format!("Line {}: missing gene_id attribute", line_num))?
        .clone();

    let pos = midpoint(start, end);

    Ok(GeneRecord {
        locus: resolver.resolve(&gene_id).map(|s| s.to_string()),
        sequence_name: attrs.get("gene_name").cloned(),
        biotype: attrs.get("gene_biotype").cloned(),
        gene_id,
        chrom: chrom.as_str().to_string(),
        chrom_num: chrom.number(),
        start,
        end,
        pos,
        arm_or_center: table.classify(chrom, pos),
        feature: fields[2].to_string(),
    })
}

/// Parse the `key "value";` attribute column
fn parse_attributes(s: &str) -> HashMap<String, String> {
    s.split(';')
        .filter_map(|part| {
            let part = part.trim();
            let (key, value) = part.split_once(' ')?;
            Some((key.to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn resolver() -> GeneIdResolver {
        GeneIdResolver::from_reader(Cursor::new(
            "6239,WBGene00003920,pot-2,F57C12.3,Live\n",
        ))
        .unwrap()
    }

    const GENE_LINE: &str = "I\tWormBase\tgene\t1000\t3000\t.\t+\t.\tgene_id \"WBGene00003920\"; gene_name \"F57C12.3\"; gene_biotype \"protein_coding\";";

    #[test]
    fn test_parse_gene_line() {
        let resolver = resolver();
        let table = ArmCenterTable::default();
        let mut records = GeneRecords::new(Cursor::new(GENE_LINE), &resolver, &table);

        let gene = records.next().unwrap().unwrap();
        assert_eq!(gene.gene_id, "WBGene00003920");
        assert_eq!(gene.locus.as_deref(), Some("pot-2"));
        assert_eq!(gene.sequence_name.as_deref(), Some("F57C12.3"));
        assert_eq!(gene.biotype.as_deref(), Some("protein_coding"));
        assert_eq!(gene.chrom, "I");
        assert_eq!(gene.chrom_num, 1);
        assert_eq!(gene.pos, 2000);
        assert_eq!(gene.feature, "gene");
        assert!(records.next().is_none());
    }

    #[test]
    fn test_unresolved_locus_is_none() {
        let resolver = GeneIdResolver::default();
        let table = ArmCenterTable::default();
        let mut records = GeneRecords::new(Cursor::new(GENE_LINE), &resolver, &table);

        let gene = records.next().unwrap().unwrap();
        assert_eq!(gene.locus, None);
    }

    #[test]
    fn test_unknown_chromosome_fails_fast() {
        let line = GENE_LINE.replacen("I\t", "chr1\t", 1);
        let resolver = resolver();
        let table = ArmCenterTable::default();
        let mut records = GeneRecords::new(Cursor::new(line), &resolver, &table);

        let err = records.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("Line 1"));
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let input = format!("#!genebuild-version 1\n\n{}\n", GENE_LINE);
        let resolver = resolver();
        let table = ArmCenterTable::default();
        let records: Vec<_> = GeneRecords::new(Cursor::new(input), &resolver, &table).collect();

        assert_eq!(records.len(), 1);
    }
}
