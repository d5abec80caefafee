//! Identifier cross-reference resolver
//!
//! Maps stable gene identifiers to human-readable locus names, built from
//! the upstream identifier file: gzip-compressed, one comma-delimited record
//! per line, where positional fields 2 and 3 (1-indexed) carry the
//! identifier and the locus name.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use tracing::info;

/// Gene identifier → locus-name mapping
#[derive(Debug, Clone, Default)]
pub struct GeneIdResolver {
    locus_names: HashMap<String, String>,
}

impl GeneIdResolver {
    /// Build the resolver from the gzip-compressed identifier file
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = super::open_gzip(path)?;
        let resolver = Self::from_reader(reader)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(identifiers = resolver.len(), "Loaded gene identifier table");
        Ok(resolver)
    }

    /// Build the resolver from already-decompressed lines
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut locus_names = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read identifier line")?;
            if line.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() < 3 {
                anyhow::bail!(
                    "Line {}: expected at least 3 comma-delimited fields, got {}",
                    idx + 1,
                    fields.len()
                );
            }

            let gene_id = fields[1].trim();
            let locus = fields[2].trim();
            if !locus.is_empty() {
                locus_names.insert(gene_id.to_string(), locus.to_string());
            }
        }

        Ok(Self { locus_names })
    }

    /// Resolve an identifier to its locus name.
    ///
    /// Missing identifiers resolve to absence, not an error.
    pub fn resolve(&self, gene_id: &str) -> Option<&str> {
        self.locus_names.get(gene_id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.locus_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locus_names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_resolve_known_identifier() {
        let input = "6239,WBGene00000001,aap-1,Y110A7A.10,Live\n\
                     6239,WBGene00003920,pot-2,F57C12.3,Live\n";
        let resolver = GeneIdResolver::from_reader(Cursor::new(input)).unwrap();

        assert_eq!(resolver.resolve("WBGene00000001"), Some("aap-1"));
        assert_eq!(resolver.resolve("WBGene00003920"), Some("pot-2"));
    }

    #[test]
    fn test_unknown_identifier_is_absent() {
        let input = "6239,WBGene00000001,aap-1,Y110A7A.10,Live\n";
        let resolver = GeneIdResolver::from_reader(Cursor::new(input)).unwrap();

        assert_eq!(resolver.resolve("WBGene99999999"), None);
    }

    #[test]
    fn test_empty_locus_resolves_to_absence() {
        let input = "6239,WBGene00022277,,Y74C9A.3,Live\n";
        let resolver = GeneIdResolver::from_reader(Cursor::new(input)).unwrap();

        assert_eq!(resolver.resolve("WBGene00022277"), None);
    }

    #[test]
    fn test_short_line_is_an_error() {
        let input = "6239,WBGene00000001\n";
        assert!(GeneIdResolver::from_reader(Cursor::new(input)).is_err());
    }
}
