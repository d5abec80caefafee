//! Build database access
//!
//! Owns the SQLite snapshot a build writes into: schema creation and the
//! chunked bulk inserts. Each insert method runs in its own transaction, so
//! the store commits per phase and a crash leaves the last completed phase
//! intact.

use crate::models::{GeneRecord, GeneSummaryRecord, HomologRecord, MetadataRecord, StrainRecord};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// Rows per bulk-insert statement
const INSERT_CHUNK: usize = 500;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE strains (
        strain TEXT PRIMARY KEY,
        isotype TEXT,
        release TEXT NOT NULL,
        latitude REAL,
        longitude REAL,
        reference_strain INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE gene_summary (
        gene_id TEXT PRIMARY KEY,
        gene_id_type TEXT NOT NULL,
        locus TEXT,
        sequence_name TEXT,
        biotype TEXT,
        chrom TEXT NOT NULL,
        chrom_num INTEGER NOT NULL,
        "start" INTEGER NOT NULL,
        "end" INTEGER NOT NULL,
        arm_or_center TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE genes (
        gene_id TEXT NOT NULL,
        locus TEXT,
        sequence_name TEXT,
        biotype TEXT,
        chrom TEXT NOT NULL,
        chrom_num INTEGER NOT NULL,
        "start" INTEGER NOT NULL,
        "end" INTEGER NOT NULL,
        pos INTEGER NOT NULL,
        arm_or_center TEXT NOT NULL,
        feature TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE homologs (
        gene_id TEXT NOT NULL,
        gene_name TEXT NOT NULL,
        homolog_species TEXT NOT NULL,
        homolog_taxon_id INTEGER,
        homolog_gene TEXT NOT NULL,
        homolog_source TEXT NOT NULL,
        is_ortholog INTEGER NOT NULL
    )
    "#,
    r#"CREATE INDEX idx_genes_gene_id ON genes (gene_id)"#,
    r#"CREATE INDEX idx_homologs_gene_id ON homologs (gene_id)"#,
];

const STRAIN_DDL_PREFIX: &str = "CREATE TABLE strains";

/// Handle on the build-time SQLite snapshot
pub struct BuildDb {
    pool: SqlitePool,
}

impl BuildDb {
    /// Open (creating if missing) the snapshot at `path`
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

    /// Create the full schema fresh
    pub async fn create_full_schema(&self) -> Result<()> {
        for ddl in SCHEMA {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .context("Failed to create schema")?;
        }
        info!("Created full schema");
        Ok(())
    }

    /// Drop and recreate only the strains table (idempotent reset)
    pub async fn reset_strain_table(&self) -> Result<()> {
        sqlx::query("DROP TABLE IF EXISTS strains")
            .execute(&self.pool)
            .await
            .context("Failed to drop strains table")?;

        let strain_ddl = SCHEMA
            .iter()
            .find(|ddl| ddl.contains(STRAIN_DDL_PREFIX))
            .context("Strain DDL missing from schema")?;
        sqlx::query(strain_ddl)
            .execute(&self.pool)
            .await
            .context("Failed to recreate strains table")?;

        info!("Reset strains table");
        Ok(())
    }

    pub async fn insert_strains(&self, strains: &[StrainRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut total = 0;

        for chunk in strains.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO strains (strain, isotype, release, latitude, longitude, reference_strain) ",
            );
            qb.push_values(chunk, |mut b, s| {
                b.push_bind(&s.strain)
                    .push_bind(&s.isotype)
                    .push_bind(&s.release)
                    .push_bind(s.latitude)
                    .push_bind(s.longitude)
                    .push_bind(s.reference_strain);
            });
            total += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        debug!(rows = total, "Inserted strains");
        Ok(total)
    }

    pub async fn insert_metadata(&self, rows: &[MetadataRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut total = 0;

        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO metadata (key, value) ");
            qb.push_values(chunk, |mut b, m| {
                b.push_bind(&m.key).push_bind(&m.value);
            });
            total += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        debug!(rows = total, "Inserted metadata");
        Ok(total)
    }

    /// Stream gene summary records into the store in one committed pass
    pub async fn insert_gene_summaries<I>(&self, records: I) -> Result<u64>
    where
        I: Iterator<Item = Result<GeneSummaryRecord>>,
    {
        let mut tx = self.pool.begin().await?;
        let mut buffer = Vec::with_capacity(INSERT_CHUNK);
        let mut total = 0;

        for record in records {
            buffer.push(record?);
            if buffer.len() == INSERT_CHUNK {
                total += Self::flush_gene_summaries(&mut tx, &buffer).await?;
                buffer.clear();
            }
        }
        if !buffer.is_empty() {
            total += Self::flush_gene_summaries(&mut tx, &buffer).await?;
        }

        tx.commit().await?;
        debug!(rows = total, "Inserted gene summaries");
        Ok(total)
    }

    async fn flush_gene_summaries(
        tx: &mut Transaction<'_, Sqlite>,
        chunk: &[GeneSummaryRecord],
    ) -> Result<u64> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"INSERT INTO gene_summary
               (gene_id, gene_id_type, locus, sequence_name, biotype, chrom, chrom_num, "start", "end", arm_or_center) "#,
        );
        qb.push_values(chunk, |mut b, g| {
            b.push_bind(&g.gene_id)
                .push_bind(&g.gene_id_type)
                .push_bind(&g.locus)
                .push_bind(&g.sequence_name)
                .push_bind(&g.biotype)
                .push_bind(&g.chrom)
                .push_bind(g.chrom_num)
                .push_bind(g.start)
                .push_bind(g.end)
                .push_bind(g.arm_or_center.as_str());
        });
        Ok(qb.build().execute(&mut **tx).await?.rows_affected())
    }

    /// Stream gene records into the store in one committed pass
    pub async fn insert_genes<I>(&self, records: I) -> Result<u64>
    where
        I: Iterator<Item = Result<GeneRecord>>,
    {
        let mut tx = self.pool.begin().await?;
        let mut buffer = Vec::with_capacity(INSERT_CHUNK);
        let mut total = 0;

        for record in records {
            buffer.push(record?);
            if buffer.len() == INSERT_CHUNK {
                total += Self::flush_genes(&mut tx, &buffer).await?;
                buffer.clear();
            }
        }
        if !buffer.is_empty() {
            total += Self::flush_genes(&mut tx, &buffer).await?;
        }

        tx.commit().await?;
        debug!(rows = total, "Inserted genes");
        Ok(total)
    }

    async fn flush_genes(tx: &mut Transaction<'_, Sqlite>, chunk: &[GeneRecord]) -> Result<u64> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"INSERT INTO genes
               (gene_id, locus, sequence_name, biotype, chrom, chrom_num, "start", "end", pos, arm_or_center, feature) "#,
        );
        qb.push_values(chunk, |mut b, g| {
            b.push_bind(&g.gene_id)
                .push_bind(&g.locus)
                .push_bind(&g.sequence_name)
                .push_bind(&g.biotype)
                .push_bind(&g.chrom)
                .push_bind(g.chrom_num)
                .push_bind(g.start)
                .push_bind(g.end)
                .push_bind(g.pos)
                .push_bind(g.arm_or_center.as_str())
                .push_bind(&g.feature);
        });
        Ok(qb.build().execute(&mut **tx).await?.rows_affected())
    }

    /// Insert one homolog pass and commit it
    pub async fn insert_homologs(&self, records: &[HomologRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut total = 0;

        for chunk in records.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO homologs \
                 (gene_id, gene_name, homolog_species, homolog_taxon_id, homolog_gene, homolog_source, is_ortholog) ",
            );
            qb.push_values(chunk, |mut b, h| {
                b.push_bind(&h.gene_id)
                    .push_bind(&h.gene_name)
                    .push_bind(&h.homolog_species)
                    .push_bind(h.homolog_taxon_id)
                    .push_bind(&h.homolog_gene)
                    .push_bind(&h.homolog_source)
                    .push_bind(h.is_ortholog);
            });
            total += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        debug!(rows = total, "Inserted homologs");
        Ok(total)
    }

    /// Per-feature row counts of the gene table, for the build log
    pub async fn feature_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT feature, COUNT(*) FROM genes GROUP BY feature ORDER BY feature",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to count gene features")?;
        Ok(rows)
    }

    /// `(gene_id, display_name)` for every summarized gene with a name,
    /// preferring locus over sequence name
    pub async fn gene_display_names(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT gene_id, COALESCE(locus, sequence_name) \
             FROM gene_summary \
             WHERE locus IS NOT NULL OR sequence_name IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read gene display names")?;
        Ok(rows)
    }

    /// Close the pool, flushing the snapshot to disk
    pub async fn close(self) {
        self.pool.close().await;
    }
}
