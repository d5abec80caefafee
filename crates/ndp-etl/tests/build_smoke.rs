//! End-to-end build over synthetic release files

use flate2::write::GzEncoder;
use flate2::Compression;
use ndp_common::gene_index::GeneIndex;
use ndp_etl::config::{BuildConfig, PathConfig, ReleaseConfig, SpeciesConfig, UrlConfig};
use ndp_etl::models::StrainRecord;
use ndp_etl::pipeline::{BuildPipeline, RawInputs};
use ndp_etl::strains::StrainSource;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const FEATURE_TABLE: &str = "\
I\tWormBase\tgene\t4116\t10230\t.\t-\t.\tgene_id \"WBGene00022277\"; gene_name \"Y74C9A.3\"; gene_biotype \"protein_coding\";\n\
II\tWormBase\tgene\t1000\t2000\t.\t+\t.\tgene_id \"WBGene00003920\"; gene_name \"F57C12.3\"; gene_biotype \"protein_coding\";\n";

const ANNOTATION: &str = "\
I\tWormBase\tgene\t4116\t10230\t.\t-\t.\tID=Gene:WBGene00022277;sequence_name=Y74C9A.3;biotype=protein_coding;locus=homt-1\n\
II\tWormBase\tgene\t1000\t2000\t.\t+\t.\tID=Gene:WBGene00003920;sequence_name=F57C12.3;biotype=protein_coding\n\
I\tWormBase\tmRNA\t4116\t10230\t.\t-\t.\tID=Transcript:Y74C9A.3.1\n";

const GENE_IDS: &str = "\
6239,WBGene00022277,homt-1,Y74C9A.3,Live\n\
6239,WBGene00003920,,F57C12.3,Live\n";

const HOMOLOGENE: &str = "\
1\t6239\t171590\thomt-1\t71985549\tNP_001021241.1\n\
1\t9606\t7012\tTERF2\t4507437\tNP_005643.2\n";

const ORTHOLOGS: &str = "\
WBGene00022277\thomt-1\n\
Homo sapiens\t0\tNAT8B\tOrthoMCL\n";

const TAXON_IDS: &str = "6239\tCaenorhabditis elegans\n9606\tHomo sapiens\n";

struct StubRegistry;

#[async_trait::async_trait]
impl StrainSource for StubRegistry {
    async fn fetch_strains(&self) -> anyhow::Result<Vec<StrainRecord>> {
        Ok(vec![
            StrainRecord {
                strain: "N2".into(),
                isotype: Some("N2".into()),
                release: "20260601".into(),
                latitude: Some(53.5),
                longitude: Some(-1.13),
                reference_strain: true,
            },
            StrainRecord {
                strain: "CB4856".into(),
                isotype: Some("CB4856".into()),
                release: "20260601".into(),
                latitude: None,
                longitude: None,
                reference_strain: false,
            },
        ])
    }
}

fn write_gzip(path: &Path, content: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn test_setup(dir: &TempDir) -> (BuildConfig, RawInputs) {
    let root = dir.path();

    let inputs = RawInputs {
        feature_table: root.join("geneset.gtf.gz"),
        annotation: root.join("annotations.gff3.gz"),
        gene_ids: root.join("geneIDs.txt.gz"),
        homologene: root.join("homologene.data"),
        orthologs: root.join("orthologs.txt"),
        taxon_ids: root.join("taxid_taxname"),
    };
    write_gzip(&inputs.feature_table, FEATURE_TABLE);
    write_gzip(&inputs.annotation, ANNOTATION);
    write_gzip(&inputs.gene_ids, GENE_IDS);
    std::fs::write(&inputs.homologene, HOMOLOGENE).unwrap();
    std::fs::write(&inputs.orthologs, ORTHOLOGS).unwrap();
    std::fs::write(&inputs.taxon_ids, TAXON_IDS).unwrap();

    let config = BuildConfig {
        release: ReleaseConfig {
            dataset_release: "20260601".into(),
            portal_version: "0.1.0".into(),
            annotation_version: "TEST1".into(),
        },
        urls: UrlConfig {
            gene_feature: "http://unused/geneset.gtf.gz".into(),
            gene_annotation: "http://unused/annotations.gff3.gz".into(),
            gene_ids: "http://unused/geneIDs.txt.gz".into(),
            homologene: "http://unused/homologene.data".into(),
            orthologs: "http://unused/orthologs.txt".into(),
            taxon_ids: "http://unused/taxid_taxname".into(),
        },
        species: SpeciesConfig {
            reference_species: "Caenorhabditis elegans".into(),
            reference_taxon_id: 6239,
        },
        paths: PathConfig {
            download_dir: root.join("download"),
            output_dir: root.join("out"),
            gene_index: root.join("out/gene_index.json"),
        },
        strain_registry_url: "http://unused/strains.tsv".into(),
    };

    (config, inputs)
}

async fn count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_build_loads_every_table() {
    let dir = TempDir::new().unwrap();
    let (config, inputs) = test_setup(&dir);
    let expected_metadata = config.flatten().len() as i64 + 2; // + build/version, build/date

    let pipeline = BuildPipeline::new(config, Box::new(StubRegistry));
    let outcome = pipeline.run("TEST1", Some(&inputs)).await.unwrap();

    assert_eq!(outcome.basename, "ndp.20260601.TEST1.db");
    assert_eq!(outcome.strains, 2);
    assert_eq!(outcome.gene_summaries, 2);
    assert_eq!(outcome.genes, 2);
    // One homologene pair plus one ortholog detail line
    assert_eq!(outcome.homologs, 2);
    assert!(!outcome.published);

    let pool = sqlx::SqlitePool::connect(&format!("sqlite://{}", outcome.db_path.display()))
        .await
        .unwrap();
    assert_eq!(count(&pool, "genes").await, 2);
    assert_eq!(count(&pool, "gene_summary").await, 2);
    assert_eq!(count(&pool, "strains").await, 2);
    assert_eq!(count(&pool, "homologs").await, 2);
    assert_eq!(count(&pool, "metadata").await, expected_metadata);

    let version: String =
        sqlx::query_scalar("SELECT value FROM metadata WHERE key = 'build/version'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(version, "TEST1");

    // Locus names joined from the identifier file
    let locus: Option<String> =
        sqlx::query_scalar("SELECT locus FROM genes WHERE gene_id = 'WBGene00022277'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(locus.as_deref(), Some("homt-1"));
    pool.close().await;
}

#[tokio::test]
async fn test_full_build_writes_gene_index() {
    let dir = TempDir::new().unwrap();
    let (config, inputs) = test_setup(&dir);
    let index_path = config.paths.gene_index.clone();

    let pipeline = BuildPipeline::new(config, Box::new(StubRegistry));
    pipeline.run("TEST1", Some(&inputs)).await.unwrap();

    let index = GeneIndex::load(&index_path).unwrap();
    assert_eq!(index.len(), 2);
    // Locus preferred where known, sequence name otherwise
    assert_eq!(index.resolve("WBGene00022277"), Some("homt-1"));
    assert_eq!(index.resolve("WBGene00003920"), Some("F57C12.3"));
}

#[tokio::test]
async fn test_strain_only_resets_strain_table() {
    let dir = TempDir::new().unwrap();
    let (config, inputs) = test_setup(&dir);

    let pipeline = BuildPipeline::new(config, Box::new(StubRegistry));
    pipeline.run("TEST1", Some(&inputs)).await.unwrap();
    let outcome = pipeline.run("TEST1", None).await.unwrap();

    assert_eq!(outcome.strains, 2);
    assert!(!outcome.published);

    let pool = sqlx::SqlitePool::connect(&format!("sqlite://{}", outcome.db_path.display()))
        .await
        .unwrap();
    assert_eq!(count(&pool, "strains").await, 2);
    // The rest of the snapshot is untouched by a strain-only run
    assert_eq!(count(&pool, "genes").await, 2);
    pool.close().await;
}
