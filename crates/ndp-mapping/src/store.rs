//! Mapping store access
//!
//! Reports, traits and mapping results live in the shared store. A worker
//! only ever touches one trait's rows; the mapping upserts of a single run
//! are grouped in one transaction so a partial failure cannot leave a
//! half-recorded result set.

use crate::models::{MappingResult, Report, TraitRecord};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS reports (
        report_slug TEXT PRIMARY KEY,
        report_hash TEXT NOT NULL,
        report_name TEXT NOT NULL,
        release INTEGER NOT NULL,
        created_on TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS traits (
        report_slug TEXT NOT NULL,
        trait_name TEXT NOT NULL,
        trait_slug TEXT NOT NULL,
        status TEXT NOT NULL,
        submission_date TEXT,
        started_on TEXT,
        completed_on TEXT,
        error_message TEXT,
        error_traceback TEXT,
        is_significant INTEGER,
        is_public INTEGER NOT NULL,
        tool_version TEXT,
        task_metadata TEXT,
        trait_data TEXT NOT NULL,
        PRIMARY KEY (report_slug, trait_slug)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS mappings (
        id TEXT PRIMARY KEY,
        chrom TEXT NOT NULL,
        pos INTEGER NOT NULL,
        interval_start INTEGER NOT NULL,
        interval_end INTEGER NOT NULL,
        log10p REAL NOT NULL,
        variance_explained REAL NOT NULL,
        report_slug TEXT NOT NULL,
        trait_slug TEXT NOT NULL,
        is_public INTEGER NOT NULL
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_mappings_slugs ON mappings (report_slug, trait_slug)"#,
];

/// Handle on the mapping side of the store
#[derive(Clone)]
pub struct MappingStore {
    pool: SqlitePool,
}

impl MappingStore {
    /// Open (creating if missing) the store at `path`
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the mapping tables if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        for ddl in SCHEMA {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .context("Failed to create mapping schema")?;
        }
        Ok(())
    }

    /// Insert a report and its traits as one atomic group
    pub async fn insert_report_with_traits(
        &self,
        report: &Report,
        traits: &[TraitRecord],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO reports (report_slug, report_hash, report_name, release, created_on) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&report.report_slug)
        .bind(&report.report_hash)
        .bind(&report.report_name)
        .bind(report.release)
        .bind(report.created_on)
        .execute(&mut *tx)
        .await
        .context("Failed to insert report")?;

        for t in traits {
            sqlx::query(
                "INSERT INTO traits \
                 (report_slug, trait_name, trait_slug, status, submission_date, started_on, \
                  completed_on, error_message, error_traceback, is_significant, is_public, \
                  tool_version, task_metadata, trait_data) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&t.report_slug)
            .bind(&t.trait_name)
            .bind(&t.trait_slug)
            .bind(t.status)
            .bind(t.submission_date)
            .bind(t.started_on)
            .bind(t.completed_on)
            .bind(&t.error_message)
            .bind(&t.error_traceback)
            .bind(t.is_significant)
            .bind(t.is_public)
            .bind(&t.tool_version)
            .bind(&t.task_metadata)
            .bind(&t.trait_data)
            .execute(&mut *tx)
            .await
            .context("Failed to insert trait")?;
        }

        tx.commit().await?;
        info!(report = %report.report_slug, traits = traits.len(), "Inserted report");
        Ok(())
    }

    /// Load the trait a worker was dispatched for
    pub async fn load_trait(&self, report_slug: &str, trait_slug: &str) -> Result<TraitRecord> {
        sqlx::query_as::<_, TraitRecord>(
            "SELECT * FROM traits WHERE report_slug = ? AND trait_slug = ?",
        )
        .bind(report_slug)
        .bind(trait_slug)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Trait not found: {}/{}", report_slug, trait_slug))
    }

    /// Persist a trait's mutable lifecycle fields
    pub async fn save_trait(&self, t: &TraitRecord) -> Result<()> {
        sqlx::query(
            "UPDATE traits SET \
             status = ?, started_on = ?, completed_on = ?, error_message = ?, \
             error_traceback = ?, is_significant = ?, tool_version = ?, task_metadata = ? \
             WHERE report_slug = ? AND trait_slug = ?",
        )
        .bind(t.status)
        .bind(t.started_on)
        .bind(t.completed_on)
        .bind(&t.error_message)
        .bind(&t.error_traceback)
        .bind(t.is_significant)
        .bind(&t.tool_version)
        .bind(&t.task_metadata)
        .bind(&t.report_slug)
        .bind(&t.trait_slug)
        .execute(&self.pool)
        .await
        .context("Failed to save trait")?;

        debug!(
            report = %t.report_slug,
            trait_slug = %t.trait_slug,
            status = %t.status.as_str(),
            "Saved trait"
        );
        Ok(())
    }

    /// Existing mapping result for a `(report_slug, trait_slug)` pair
    pub async fn find_mapping(
        &self,
        report_slug: &str,
        trait_slug: &str,
    ) -> Result<Option<MappingResult>> {
        sqlx::query_as::<_, MappingResult>(
            "SELECT * FROM mappings WHERE report_slug = ? AND trait_slug = ?",
        )
        .bind(report_slug)
        .bind(trait_slug)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up mapping")
    }

    /// Upsert one run's mapping results in a single transaction.
    ///
    /// Each result is keyed by `(report_slug, trait_slug)`: an existing row
    /// is mutated in place (its id kept), otherwise the caller-supplied
    /// fresh id is inserted. The lookup-before-insert is what makes a re-run
    /// idempotent; it is mandatory, not an optimization.
    pub async fn record_mappings(&self, mappings: &[MappingResult]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for m in mappings {
            let existing: Option<String> =
                sqlx::query_scalar("SELECT id FROM mappings WHERE report_slug = ? AND trait_slug = ?")
                    .bind(&m.report_slug)
                    .bind(&m.trait_slug)
                    .fetch_optional(&mut *tx)
                    .await
                    .context("Failed to look up existing mapping")?;

            match existing {
                Some(id) => {
                    sqlx::query(
                        "UPDATE mappings SET \
                         chrom = ?, pos = ?, interval_start = ?, interval_end = ?, \
                         log10p = ?, variance_explained = ?, is_public = ? \
                         WHERE id = ?",
                    )
                    .bind(&m.chrom)
                    .bind(m.pos)
                    .bind(m.interval_start)
                    .bind(m.interval_end)
                    .bind(m.log10p)
                    .bind(m.variance_explained)
                    .bind(m.is_public)
                    .bind(&id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update mapping")?;
                },
                None => {
                    sqlx::query(
                        "INSERT INTO mappings \
                         (id, chrom, pos, interval_start, interval_end, log10p, \
                          variance_explained, report_slug, trait_slug, is_public) \
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(&m.id)
                    .bind(&m.chrom)
                    .bind(m.pos)
                    .bind(m.interval_start)
                    .bind(m.interval_end)
                    .bind(m.log10p)
                    .bind(m.variance_explained)
                    .bind(&m.report_slug)
                    .bind(&m.trait_slug)
                    .bind(m.is_public)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to insert mapping")?;
                },
            }
        }

        tx.commit().await?;
        debug!(mappings = mappings.len(), "Recorded mapping results");
        Ok(())
    }
}
