//! Integration tests for the jalak-hijau generation and analysis pipeline.
//!
//! Run with: cargo test --test integration

use std::path::Path;

use chrono::NaiveDate;

use jalak_hijau::cluster::PatternTag;
use jalak_hijau::config::Config;
use jalak_hijau::ingest::{self, LoadError};
use jalak_hijau::output::{self, write_registry};
use jalak_hijau::report::{Priority, StrReport};
use jalak_hijau::summary::scores_digest;
use jalak_hijau::transaction::{Category, Transaction};
use jalak_hijau::{analyze, generate_batch, generate_registry, RegistrySource};

fn config(dir: &Path, transactions: usize) -> Config {
    let mut cfg = Config::default();
    cfg.generation.transactions = transactions;
    cfg.generation.individuals = 60;
    cfg.generation.seed = Some(2024);
    cfg.generation.anchor = NaiveDate::from_ymd_opt(2025, 6, 15).and_then(|d| d.and_hms_opt(12, 0, 0));
    cfg.output.dir = dir.to_path_buf();
    cfg
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

#[test]
fn test_missing_registry_falls_back_to_builtin() {
    let dir = tempfile::tempdir().unwrap();
    let batch = generate_batch(&config(dir.path(), 400), None).unwrap();

    assert_eq!(batch.registry_source, RegistrySource::Builtin);
    // six palm, six shell, plus the two featured-case companies
    assert_eq!(batch.companies.len(), 14);
    assert_eq!(batch.individuals.len(), 60);
    assert_eq!(batch.transactions.len(), 406);
    assert_eq!(batch.case_study.len(), 6);
    assert_eq!(batch.summary.total_transactions, 406);
}

#[test]
fn test_batch_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 500);
    let a = generate_batch(&cfg, None).unwrap();
    let b = generate_batch(&cfg, None).unwrap();

    assert_eq!(a.transactions, b.transactions);
    assert_eq!(a.clusters, b.clusters);
    assert_eq!(a.summary, b.summary);
}

#[test]
fn test_featured_case_is_clustered() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 800);
    let batch = generate_batch(&cfg, None).unwrap();

    let case = &cfg.featured_case;
    let front = batch
        .clusters
        .iter()
        .find(|c| c.primary_entity == case.company_npwp)
        .expect("featured company should form a cluster");
    assert!(front.transaction_count >= 6);
    assert!(front.has_tag(PatternTag::RapidSuccession));
    assert!(batch
        .case_study
        .iter()
        .all(|t| front.transaction_ids.contains(&t.transaction_id)));
}

#[test]
fn test_disabled_case_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), 300);
    cfg.featured_case.enabled = false;
    let batch = generate_batch(&cfg, None).unwrap();

    assert!(batch.case_study.is_empty());
    assert_eq!(batch.companies.len(), 12);
    assert!(!batch
        .transactions
        .iter()
        .any(|t| t.involves(&cfg.featured_case.company_npwp)));
    assert!(batch.tables().case_study.is_none());
}

#[test]
fn test_generated_scores_match_flags() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1_000);
    let batch = generate_batch(&cfg, None).unwrap();

    for tx in &batch.transactions {
        assert!(tx.risk_score() <= 100);
        assert_eq!(tx.is_flagged(), tx.risk_score() > 70);
        assert_eq!(tx.reporting_threshold_flag(), tx.amount_idr >= 50_000_000);
        if tx.pattern_type == Category::Legitimate || tx.pattern_type == Category::SuspiciousStructuring {
            assert!(!tx.cross_border);
        }
    }
    for cluster in &batch.clusters {
        assert!(cluster.transaction_count >= 3);
        let members = cluster.transactions(&batch.transactions);
        assert_eq!(members.len(), cluster.transaction_count);
        assert!(members.iter().all(|t| t.risk_score() > 60));
        assert!(members.iter().all(|t| t.involves(&cluster.primary_entity)));
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[test]
fn test_write_and_reanalyze() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 600);
    let batch = generate_batch(&cfg, None).unwrap();
    let paths = output::write_tables(dir.path(), &cfg.output.base, &batch.tables(), &cfg.scoring).unwrap();

    for path in paths.written() {
        assert!(path.exists(), "{} missing", path.display());
    }
    assert!(paths.individuals.is_some());
    assert!(paths.case_study.is_some());

    let loaded = ingest::load_transactions(&paths.transactions).unwrap();
    assert_eq!(loaded, batch.transactions);

    let high = ingest::load_transactions(&paths.high_risk).unwrap();
    assert_eq!(high.len(), batch.summary.high_risk_transactions);

    let clusters = ingest::load_clusters(&paths.clusters_json).unwrap();
    assert_eq!(clusters.len(), batch.clusters.len());
    for (loaded, original) in clusters.iter().zip(&batch.clusters) {
        assert_eq!(loaded.cluster_id, original.cluster_id);
        assert_eq!(loaded.transaction_ids, original.transaction_ids);
        assert_eq!(loaded.pattern_analysis, original.pattern_analysis);
    }

    let analysis = analyze(&loaded, &cfg);
    assert_eq!(analysis.rescored, 0);
    assert_eq!(analysis.clusters, batch.clusters);
    assert_eq!(analysis.summary.scores_digest, batch.summary.scores_digest);

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&paths.summary).unwrap()).unwrap();
    assert_eq!(summary["total_transactions"], 606);
    assert!(summary["scores_digest"].as_str().unwrap().starts_with("sha256:"));
}

#[test]
fn test_reanalysis_with_new_weights() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 400);
    let batch = generate_batch(&cfg, None).unwrap();

    let mut strict = cfg.clone();
    strict.scoring.max_score = 50;
    strict.scoring.flag_threshold = 40;
    let analysis = analyze(&batch.transactions, &strict);

    assert!(analysis.rescored > 0);
    assert!(analysis.transactions.iter().all(|t| t.risk_score() <= 50));
    assert_ne!(analysis.summary.scores_digest, batch.summary.scores_digest);
    // no score can exceed the cluster threshold any more
    assert!(analysis.clusters.is_empty());
}

#[test]
fn test_registry_round_trip_into_generate() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), 300);
    cfg.generation.shell_companies = 10;

    let profiles = generate_registry(&cfg, None).unwrap();
    let paths = write_registry(dir.path(), &cfg.output.registry_base, &profiles).unwrap();
    assert!(paths.detailed.exists());

    let holders = std::fs::read_to_string(&paths.shareholders).unwrap();
    assert!(holders.starts_with("company_id,nama_pemegang_saham,nik,npwp,persentase_kepemilikan"));

    let batch = generate_batch(&cfg, None).unwrap();
    assert_eq!(batch.registry_source, RegistrySource::File(cfg.output.registry_path()));
    // registry NPWPs are generated, so the featured companies never collide
    assert_eq!(batch.companies.len(), profiles.len() + 2);
}

#[test]
fn test_malformed_registry_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 100);
    std::fs::write(
        cfg.output.registry_path(),
        "company_id,nama_perseroan,npwp_perusahaan,is_suspicious,risk_score\nPT_0001,PT A,1,maybe,20\n",
    )
    .unwrap();

    let err = generate_batch(&cfg, None).unwrap_err();
    let load = err.downcast_ref::<LoadError>().expect("load error in chain");
    assert!(matches!(load, LoadError::Malformed { row: 1, .. }));
}

#[test]
fn test_out_of_range_timing_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), 50);
    cfg.clusters.rapid_window_hours = i64::MAX / 1000;
    assert!(generate_batch(&cfg, None).is_err());

    let mut cfg = config(dir.path(), 50);
    cfg.featured_case.structuring_interval_hours = i64::MAX / 1000;
    assert!(generate_batch(&cfg, None).is_err());

    let mut cfg = config(dir.path(), 50);
    cfg.featured_case.placement_days_before_anchor = -1;
    assert!(generate_batch(&cfg, None).is_err());
}

#[test]
fn test_huge_amounts_load_and_analyze() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 50);
    let batch = generate_batch(&cfg, None).unwrap();

    let mut huge = batch.case_study.clone();
    for tx in &mut huge {
        tx.amount_idr = 10_000_000_000_000_000_000;
    }
    let path = dir.path().join("huge.csv");
    output::write_csv(&path, Transaction::CSV_COLUMNS, &huge).unwrap();

    let loaded = ingest::load_transactions(&path).unwrap();
    let analysis = analyze(&loaded, &cfg);
    assert_eq!(analysis.summary.total_amount_idr, u64::MAX);
    let cluster = analysis
        .clusters
        .iter()
        .find(|c| c.primary_entity == cfg.featured_case.company_npwp)
        .unwrap();
    assert_eq!(cluster.total_amount, u64::MAX);

    let date = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
    let text = StrReport::new(cluster, &analysis.transactions, &cfg.featured_case, date).to_string();
    assert!(text.starts_with("SUSPICIOUS TRANSACTION REPORT (STR)"));
}

#[test]
fn test_missing_transactions_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = ingest::load_transactions(&dir.path().join("nope.csv")).unwrap_err();
    assert!(err.is_not_found());
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[test]
fn test_report_for_featured_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 300);
    let batch = generate_batch(&cfg, None).unwrap();

    let cluster = batch
        .clusters
        .iter()
        .find(|c| cfg.featured_case.involves(&c.primary_entity))
        .unwrap();
    let date = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
    let report = StrReport::new(cluster, &batch.transactions, &cfg.featured_case, date);

    assert_eq!(report.priority(), Priority::Critical);
    let text = report.to_string();
    assert!(text.starts_with("SUSPICIOUS TRANSACTION REPORT (STR)"));
    assert!(text.contains(&format!("ALERT ID: {}", cluster.cluster_id)));
    assert!(text.contains("Hutan Lindung Riau Tengah"));
}

#[test]
fn test_digest_ignores_batch_order() {
    let dir = tempfile::tempdir().unwrap();
    let batch = generate_batch(&config(dir.path(), 200), None).unwrap();
    let mut reversed = batch.transactions.clone();
    reversed.reverse();
    assert_eq!(scores_digest(&reversed), batch.summary.scores_digest);
}
