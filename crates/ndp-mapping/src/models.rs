//! Mapping-side record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};

/// Lifecycle state of a mapping job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TraitStatus {
    Queue,
    Running,
    Complete,
    Error,
}

impl TraitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TraitStatus::Queue => "queue",
            TraitStatus::Running => "running",
            TraitStatus::Complete => "complete",
            TraitStatus::Error => "error",
        }
    }
}

/// Visibility classification of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum ReleaseTier {
    Public = 0,
    Embargo = 1,
    Private = 2,
}

impl ReleaseTier {
    /// Public reports are addressed by slug; restricted tiers by hash
    pub fn is_public(self) -> bool {
        matches!(self, ReleaseTier::Public)
    }
}

/// A submitted mapping report, parent of its traits
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub report_slug: String,
    pub report_hash: String,
    pub report_name: String,
    pub release: ReleaseTier,
    pub created_on: DateTime<Utc>,
}

impl Report {
    pub fn new(report_name: &str, report_slug: &str, release: ReleaseTier) -> Self {
        Self {
            report_slug: report_slug.to_string(),
            report_hash: report_hash(report_slug),
            report_name: report_name.to_string(),
            release,
            created_on: Utc::now(),
        }
    }
}

/// Obfuscated report address for restricted tiers: the first 20 hex
/// characters of the SHA-224 of the slug
pub fn report_hash(report_slug: &str) -> String {
    let digest = Sha224::digest(report_slug.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..20].to_string()
}

/// One trait of a report, the unit of work of a mapping job
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TraitRecord {
    pub report_slug: String,
    pub trait_name: String,
    pub trait_slug: String,
    pub status: TraitStatus,
    pub submission_date: Option<DateTime<Utc>>,
    pub started_on: Option<DateTime<Utc>>,
    pub completed_on: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub error_traceback: Option<String>,
    pub is_significant: Option<bool>,
    pub is_public: bool,
    /// External-tool version captured at job start (best effort)
    pub tool_version: Option<String>,
    /// Execution-environment metadata captured at job start (best effort)
    pub task_metadata: Option<String>,
    /// Raw tab-separated phenotype table
    pub trait_data: String,
}

/// One significant genomic interval discovered for a trait
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MappingResult {
    pub id: String,
    pub chrom: String,
    pub pos: i64,
    pub interval_start: i64,
    pub interval_end: i64,
    pub log10p: f64,
    pub variance_explained: f64,
    pub report_slug: String,
    pub trait_slug: String,
    pub is_public: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_hash_is_stable_and_truncated() {
        let hash = report_hash("heat-tolerance");
        assert_eq!(hash.len(), 20);
        assert_eq!(hash, report_hash("heat-tolerance"));
        assert_ne!(hash, report_hash("cold-tolerance"));
    }

    #[test]
    fn test_release_tier_visibility() {
        assert!(ReleaseTier::Public.is_public());
        assert!(!ReleaseTier::Embargo.is_public());
        assert!(!ReleaseTier::Private.is_public());
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(TraitStatus::Queue.as_str(), "queue");
        assert_eq!(TraitStatus::Error.as_str(), "error");
    }
}
