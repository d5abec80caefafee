//! Strain registry collaborator
//!
//! The strain catalog is owned by an external registry; the build only
//! consumes it. [`StrainSource`] is the seam, with an HTTP-backed
//! implementation fetching the registry's tab-delimited export.

use crate::models::StrainRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::BufRead;
use tracing::info;

/// Source of the strain catalog
#[async_trait]
pub trait StrainSource: Send + Sync {
    async fn fetch_strains(&self) -> Result<Vec<StrainRecord>>;
}

/// Registry fetching a tab-delimited export over HTTP
///
/// Columns: strain, isotype, release, latitude, longitude,
/// reference_strain; the first line is a header.
pub struct HttpStrainRegistry {
    url: String,
    client: reqwest::Client,
}

impl HttpStrainRegistry {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl StrainSource for HttpStrainRegistry {
    async fn fetch_strains(&self) -> Result<Vec<StrainRecord>> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Strain registry request failed: {}", self.url))?
            .error_for_status()
            .context("Strain registry returned an error status")?
            .text()
            .await
            .context("Failed to read strain registry body")?;

        let strains = parse_strain_table(body.as_bytes())?;
        info!(strains = strains.len(), "Fetched strain catalog");
        Ok(strains)
    }
}

/// Parse the registry's tab-delimited export (header line first)
pub fn parse_strain_table<R: BufRead>(reader: R) -> Result<Vec<StrainRecord>> {
    let mut strains = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read strain line")?;
        if idx == 0 || line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 6 {
            anyhow::bail!(
                "Line {}: expected 6 tab-delimited fields, got {}",
                idx + 1,
                fields.len()
            );
        }

        strains.push(StrainRecord {
            strain: fields[0].to_string(),
            isotype: non_empty(fields[1]),
            release: fields[2].to_string(),
            latitude: fields[3].parse().ok(),
            longitude: fields[4].parse().ok(),
            reference_strain: fields[5].trim() == "1" || fields[5].trim().eq_ignore_ascii_case("true"),
        });
    }

    Ok(strains)
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_strain_table() {
        let input = "strain\tisotype\trelease\tlatitude\tlongitude\treference_strain\n\
                     N2\tN2\t20260601\t53.5\t-1.13\t1\n\
                     CB4856\tCB4856\t20260601\t21.33\t-157.86\t0\n\
                     JU1400\t\t20260601\t\t\tfalse\n";
        let strains = parse_strain_table(Cursor::new(input)).unwrap();

        assert_eq!(strains.len(), 3);
        assert_eq!(strains[0].strain, "N2");
        assert!(strains[0].reference_strain);
        assert_eq!(strains[0].latitude, Some(53.5));
        assert!(!strains[1].reference_strain);
        assert_eq!(strains[2].isotype, None);
        assert_eq!(strains[2].latitude, None);
    }

    #[test]
    fn test_short_line_is_an_error() {
        let input = "strain\tisotype\trelease\tlatitude\tlongitude\treference_strain\n\
                     N2\tN2\n";
        assert!(parse_strain_table(Cursor::new(input)).is_err());
    }
}
