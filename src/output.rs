//! Flat-file outputs for the dashboard.
//!
//! Every table is a headed CSV. Nested records (clusters, registry
//! entries) get a flattened CSV next to a JSON export that keeps the full
//! structure.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use serde::Serialize;

use crate::cluster::Cluster;
use crate::party::Individual;
use crate::registry::CompanyProfile;
use crate::scoring::RiskWeights;
use crate::summary::{high_risk, Summary};
use crate::transaction::{datetime_format, Transaction};

/// Separator for list-valued cells.
pub const LIST_SEPARATOR: &str = "|";

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write `rows` as a headed CSV, returning the number of data rows.
///
/// `columns` must match the serialized field names of `T`. It is written
/// only when there are no rows, so an empty table still carries its header.
pub fn write_csv<T, I>(path: &Path, columns: &[&str], rows: I) -> Result<usize>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(path)
        .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
    let mut count = 0;
    for row in rows {
        writer
            .serialize(row)
            .wrap_err_with(|| format!("Failed to write row {} of {}", count + 1, path.display()))?;
        count += 1;
    }
    if count == 0 {
        writer
            .write_record(columns)
            .wrap_err_with(|| format!("Failed to write header of {}", path.display()))?;
    }
    writer
        .flush()
        .wrap_err_with(|| format!("Failed to flush {}", path.display()))?;
    Ok(count)
}

/// Write `value` as pretty-printed JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .wrap_err_with(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, json).wrap_err_with(|| format!("Failed to write {}", path.display()))
}

// ---------------------------------------------------------------------------
// Flat rows
// ---------------------------------------------------------------------------

/// One cluster as a single CSV row.
#[derive(Debug, Serialize)]
pub struct ClusterRow<'a> {
    pub cluster_id: &'a str,
    pub primary_entity: &'a str,
    pub transaction_count: usize,
    pub total_amount: u64,
    pub start_date: String,
    pub end_date: String,
    pub avg_risk_score: f64,
    pub pattern_analysis: String,
    pub transaction_ids: String,
}

impl ClusterRow<'_> {
    pub const COLUMNS: &'static [&'static str] = &[
        "cluster_id",
        "primary_entity",
        "transaction_count",
        "total_amount",
        "start_date",
        "end_date",
        "avg_risk_score",
        "pattern_analysis",
        "transaction_ids",
    ];
}

impl<'a> From<&'a Cluster> for ClusterRow<'a> {
    fn from(c: &'a Cluster) -> Self {
        Self {
            cluster_id: &c.cluster_id,
            primary_entity: &c.primary_entity,
            transaction_count: c.transaction_count,
            total_amount: c.total_amount,
            start_date: c.date_range.start.format(datetime_format::FORMAT).to_string(),
            end_date: c.date_range.end.format(datetime_format::FORMAT).to_string(),
            avg_risk_score: (c.avg_risk_score * 100.0).round() / 100.0,
            pattern_analysis: c
                .pattern_analysis
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR),
            transaction_ids: c.transaction_ids.join(LIST_SEPARATOR),
        }
    }
}

/// A registry entry with its first three shareholders flattened.
#[derive(Debug, Serialize)]
pub struct CompanyRow<'a> {
    pub company_id: &'a str,
    pub nama_perseroan: &'a str,
    pub kbli: &'a str,
    pub alamat_lengkap: &'a str,
    pub kode_pos: &'a str,
    pub maksud_tujuan: &'a str,
    pub modal_dasar: u64,
    pub modal_ditempatkan: u64,
    pub modal_disetor: u64,
    pub nilai_nominal_saham: u64,
    pub jumlah_saham: u64,
    pub jumlah_pemegang_saham: usize,
    pub direktur_utama: &'a str,
    pub direktur_nik: &'a str,
    pub direktur_npwp: &'a str,
    pub komisaris_utama: &'a str,
    pub komisaris_nik: &'a str,
    pub komisaris_npwp: &'a str,
    pub jangka_waktu: &'a str,
    pub tanggal_akta: String,
    pub notaris: &'a str,
    pub npwp_perusahaan: &'a str,
    pub status_perusahaan: &'a str,
    pub is_suspicious: bool,
    pub risk_score: u8,
    pub pemegang_saham_1_nama: Option<&'a str>,
    pub pemegang_saham_1_nik: Option<&'a str>,
    pub pemegang_saham_1_npwp: Option<&'a str>,
    pub pemegang_saham_1_persentase: Option<f64>,
    pub pemegang_saham_2_nama: Option<&'a str>,
    pub pemegang_saham_2_nik: Option<&'a str>,
    pub pemegang_saham_2_npwp: Option<&'a str>,
    pub pemegang_saham_2_persentase: Option<f64>,
    pub pemegang_saham_3_nama: Option<&'a str>,
    pub pemegang_saham_3_nik: Option<&'a str>,
    pub pemegang_saham_3_npwp: Option<&'a str>,
    pub pemegang_saham_3_persentase: Option<f64>,
}

impl CompanyRow<'_> {
    pub const COLUMNS: &'static [&'static str] = &[
        "company_id",
        "nama_perseroan",
        "kbli",
        "alamat_lengkap",
        "kode_pos",
        "maksud_tujuan",
        "modal_dasar",
        "modal_ditempatkan",
        "modal_disetor",
        "nilai_nominal_saham",
        "jumlah_saham",
        "jumlah_pemegang_saham",
        "direktur_utama",
        "direktur_nik",
        "direktur_npwp",
        "komisaris_utama",
        "komisaris_nik",
        "komisaris_npwp",
        "jangka_waktu",
        "tanggal_akta",
        "notaris",
        "npwp_perusahaan",
        "status_perusahaan",
        "is_suspicious",
        "risk_score",
        "pemegang_saham_1_nama",
        "pemegang_saham_1_nik",
        "pemegang_saham_1_npwp",
        "pemegang_saham_1_persentase",
        "pemegang_saham_2_nama",
        "pemegang_saham_2_nik",
        "pemegang_saham_2_npwp",
        "pemegang_saham_2_persentase",
        "pemegang_saham_3_nama",
        "pemegang_saham_3_nik",
        "pemegang_saham_3_npwp",
        "pemegang_saham_3_persentase",
    ];
}

impl<'a> From<&'a CompanyProfile> for CompanyRow<'a> {
    fn from(p: &'a CompanyProfile) -> Self {
        let holders = &p.pemegang_saham;
        let [h1, h2, h3] = [holders.first(), holders.get(1), holders.get(2)];
        Self {
            company_id: &p.company_id,
            nama_perseroan: &p.nama_perseroan,
            kbli: &p.kbli,
            alamat_lengkap: &p.alamat_lengkap,
            kode_pos: &p.kode_pos,
            maksud_tujuan: &p.maksud_tujuan,
            modal_dasar: p.modal_dasar,
            modal_ditempatkan: p.modal_ditempatkan,
            modal_disetor: p.modal_disetor,
            nilai_nominal_saham: p.nilai_nominal_saham,
            jumlah_saham: p.jumlah_saham,
            jumlah_pemegang_saham: p.pemegang_saham.len(),
            direktur_utama: &p.direktur_utama,
            direktur_nik: &p.direktur_nik,
            direktur_npwp: &p.direktur_npwp,
            komisaris_utama: &p.komisaris_utama,
            komisaris_nik: &p.komisaris_nik,
            komisaris_npwp: &p.komisaris_npwp,
            jangka_waktu: &p.jangka_waktu,
            tanggal_akta: p.tanggal_akta.format("%Y-%m-%d").to_string(),
            notaris: &p.notaris,
            npwp_perusahaan: &p.npwp_perusahaan,
            status_perusahaan: &p.status_perusahaan,
            is_suspicious: p.is_suspicious,
            risk_score: p.risk_score,
            pemegang_saham_1_nama: h1.map(|h| h.nama.as_str()),
            pemegang_saham_1_nik: h1.map(|h| h.nik.as_str()),
            pemegang_saham_1_npwp: h1.map(|h| h.npwp.as_str()),
            pemegang_saham_1_persentase: h1.map(|h| h.persentase),
            pemegang_saham_2_nama: h2.map(|h| h.nama.as_str()),
            pemegang_saham_2_nik: h2.map(|h| h.nik.as_str()),
            pemegang_saham_2_npwp: h2.map(|h| h.npwp.as_str()),
            pemegang_saham_2_persentase: h2.map(|h| h.persentase),
            pemegang_saham_3_nama: h3.map(|h| h.nama.as_str()),
            pemegang_saham_3_nik: h3.map(|h| h.nik.as_str()),
            pemegang_saham_3_npwp: h3.map(|h| h.npwp.as_str()),
            pemegang_saham_3_persentase: h3.map(|h| h.persentase),
        }
    }
}

#[derive(Debug, Serialize)]
struct ShareholderRow<'a> {
    company_id: &'a str,
    nama_pemegang_saham: &'a str,
    nik: &'a str,
    npwp: &'a str,
    persentase_kepemilikan: f64,
}

impl ShareholderRow<'_> {
    const COLUMNS: &'static [&'static str] = &[
        "company_id",
        "nama_pemegang_saham",
        "nik",
        "npwp",
        "persentase_kepemilikan",
    ];
}

// ---------------------------------------------------------------------------
// Batch tables
// ---------------------------------------------------------------------------

/// Everything written for one batch. Optional parts are skipped when absent.
pub struct Tables<'a> {
    pub transactions: &'a [Transaction],
    pub clusters: &'a [Cluster],
    pub summary: &'a Summary,
    pub individuals: Option<&'a [Individual]>,
    pub case_study: Option<&'a [Transaction]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub transactions: PathBuf,
    pub high_risk: PathBuf,
    pub clusters_csv: PathBuf,
    pub clusters_json: PathBuf,
    pub summary: PathBuf,
    pub individuals: Option<PathBuf>,
    pub case_study: Option<PathBuf>,
}

impl OutputPaths {
    pub fn written(&self) -> Vec<&Path> {
        let mut paths = vec![
            self.transactions.as_path(),
            self.high_risk.as_path(),
            self.clusters_csv.as_path(),
            self.clusters_json.as_path(),
        ];
        paths.extend(self.individuals.as_deref());
        paths.extend(self.case_study.as_deref());
        paths.push(self.summary.as_path());
        paths
    }
}

fn suffixed(dir: &Path, base: &str, suffix: &str, ext: &str) -> PathBuf {
    dir.join(format!("{base}{suffix}.{ext}"))
}

/// Write the batch tables under `dir` with file names derived from `base`.
pub fn write_tables(
    dir: &Path,
    base: &str,
    tables: &Tables<'_>,
    weights: &RiskWeights,
) -> Result<OutputPaths> {
    fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create output directory {}", dir.display()))?;

    let paths = OutputPaths {
        transactions: suffixed(dir, base, "", "csv"),
        high_risk: suffixed(dir, base, "_high_risk", "csv"),
        clusters_csv: suffixed(dir, base, "_clusters", "csv"),
        clusters_json: suffixed(dir, base, "_clusters", "json"),
        summary: suffixed(dir, base, "_summary", "json"),
        individuals: tables
            .individuals
            .map(|_| suffixed(dir, base, "_individuals", "csv")),
        case_study: tables
            .case_study
            .map(|_| suffixed(dir, base, "_case_study", "csv")),
    };

    write_csv(&paths.transactions, Transaction::CSV_COLUMNS, tables.transactions)?;
    let high = write_csv(
        &paths.high_risk,
        Transaction::CSV_COLUMNS,
        high_risk(tables.transactions, weights),
    )?;
    write_csv(
        &paths.clusters_csv,
        ClusterRow::COLUMNS,
        tables.clusters.iter().map(ClusterRow::from),
    )?;
    write_json(&paths.clusters_json, tables.clusters)?;
    if let (Some(path), Some(rows)) = (&paths.individuals, tables.individuals) {
        write_csv(path, Individual::CSV_COLUMNS, rows)?;
    }
    if let (Some(path), Some(rows)) = (&paths.case_study, tables.case_study) {
        write_csv(path, Transaction::CSV_COLUMNS, rows)?;
    }
    write_json(&paths.summary, tables.summary)?;

    tracing::info!(
        dir = %dir.display(),
        transactions = tables.transactions.len(),
        high_risk = high,
        clusters = tables.clusters.len(),
        "wrote batch tables"
    );

    Ok(paths)
}

// ---------------------------------------------------------------------------
// Registry tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryPaths {
    pub companies: PathBuf,
    pub detailed: PathBuf,
    pub shareholders: PathBuf,
}

pub fn write_registry(dir: &Path, base: &str, profiles: &[CompanyProfile]) -> Result<RegistryPaths> {
    fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create output directory {}", dir.display()))?;

    let paths = RegistryPaths {
        companies: suffixed(dir, base, "", "csv"),
        detailed: suffixed(dir, base, "_detailed", "json"),
        shareholders: suffixed(dir, base, "_shareholders", "csv"),
    };

    write_csv(&paths.companies, CompanyRow::COLUMNS, profiles.iter().map(CompanyRow::from))?;
    write_json(&paths.detailed, profiles)?;
    let holders = write_csv(
        &paths.shareholders,
        ShareholderRow::COLUMNS,
        profiles.iter().flat_map(|p| {
            p.pemegang_saham.iter().map(move |h| ShareholderRow {
                company_id: &p.company_id,
                nama_pemegang_saham: &h.nama,
                nik: &h.nik,
                npwp: &h.npwp,
                persentase_kepemilikan: h.persentase,
            })
        }),
    )?;

    tracing::info!(
        dir = %dir.display(),
        companies = profiles.len(),
        shareholders = holders,
        "wrote registry tables"
    );

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::FeaturedCase;
    use crate::cluster::{DateRange, PatternTag};
    use crate::registry::generate_registry;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn header_of<T: Serialize>(row: T) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(row).unwrap();
        let bytes = writer.into_inner().unwrap();
        String::from_utf8(bytes).unwrap().lines().next().unwrap().to_string()
    }

    fn anchor() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_cluster_row_joins_lists() {
        let at = |h| {
            NaiveDate::from_ymd_opt(2024, 9, 10)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        let cluster = Cluster {
            cluster_id: "CLUSTER_001".into(),
            primary_entity: "73.590.760.9-174.110".into(),
            transaction_count: 3,
            total_amount: 141_700_000,
            date_range: DateRange { start: at(9), end: at(11) },
            transaction_ids: vec!["TXN_000001".into(), "TXN_000002".into(), "TXN_000003".into()],
            avg_risk_score: 100.0 / 3.0,
            pattern_analysis: vec![PatternTag::StructuringDetected, PatternTag::RapidSuccession],
        };
        let row = ClusterRow::from(&cluster);
        assert_eq!(row.pattern_analysis, "STRUCTURING_DETECTED|RAPID_SUCCESSION");
        assert_eq!(row.transaction_ids, "TXN_000001|TXN_000002|TXN_000003");
        assert_eq!(row.start_date, "2024-09-10 09:00:00");
        assert_eq!(row.avg_risk_score, 33.33);
    }

    #[test]
    fn test_write_csv_counts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        #[derive(Serialize)]
        struct Row {
            a: u32,
            b: &'static str,
        }
        let rows = [Row { a: 1, b: "x,y" }, Row { a: 2, b: "z" }];
        let n = write_csv(&path, &["a", "b"], rows).unwrap();
        assert_eq!(n, 2);
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a,b\n1,\"x,y\"\n2,z\n");
    }

    #[test]
    fn test_column_lists_match_serialized_headers() {
        let txs = FeaturedCase::default()
            .transactions(anchor(), &RiskWeights::default())
            .unwrap();
        assert_eq!(header_of(&txs[0]), Transaction::CSV_COLUMNS.join(","));

        let person = Individual {
            person_id: "IND_0001".into(),
            full_name: "Budi Santoso".into(),
            nik: "1471010101900001".into(),
            npwp: "12.345.678.9-012.345".into(),
            account_number: "1234567890".into(),
            is_nominee: false,
        };
        assert_eq!(header_of(&person), Individual::CSV_COLUMNS.join(","));

        let mut rng = StdRng::seed_from_u64(5);
        let profiles = generate_registry(&mut rng, &["SAWIT RAYA".to_string()], 1, anchor());
        assert_eq!(header_of(CompanyRow::from(&profiles[0])), CompanyRow::COLUMNS.join(","));
        let h = &profiles[0].pemegang_saham[0];
        let holder = ShareholderRow {
            company_id: &profiles[0].company_id,
            nama_pemegang_saham: &h.nama,
            nik: &h.nik,
            npwp: &h.npwp,
            persentase_kepemilikan: h.persentase,
        };
        assert_eq!(header_of(holder), ShareholderRow::COLUMNS.join(","));

        let cluster = Cluster {
            cluster_id: "CLUSTER_001".into(),
            primary_entity: "73.590.760.9-174.110".into(),
            transaction_count: 0,
            total_amount: 0,
            date_range: DateRange { start: anchor(), end: anchor() },
            transaction_ids: Vec::new(),
            avg_risk_score: 0.0,
            pattern_analysis: Vec::new(),
        };
        assert_eq!(header_of(ClusterRow::from(&cluster)), ClusterRow::COLUMNS.join(","));
    }

    #[test]
    fn test_empty_tables_keep_header() {
        let dir = tempfile::tempdir().unwrap();
        let txs = FeaturedCase::default()
            .transactions(anchor(), &RiskWeights::default())
            .unwrap();
        let lenient = RiskWeights {
            flag_threshold: 100,
            ..RiskWeights::default()
        };
        let summary = Summary::compute(&txs, &[], &lenient);
        let tables = Tables {
            transactions: &txs,
            clusters: &[],
            summary: &summary,
            individuals: Some(&[]),
            case_study: None,
        };
        let paths = write_tables(dir.path(), "empty", &tables, &lenient).unwrap();

        let header = format!("{}\n", Transaction::CSV_COLUMNS.join(","));
        assert_eq!(fs::read_to_string(&paths.high_risk).unwrap(), header);
        assert_eq!(
            fs::read_to_string(&paths.clusters_csv).unwrap(),
            format!("{}\n", ClusterRow::COLUMNS.join(","))
        );
        assert_eq!(
            fs::read_to_string(paths.individuals.unwrap()).unwrap(),
            format!("{}\n", Individual::CSV_COLUMNS.join(","))
        );
        assert_eq!(fs::read_to_string(&paths.clusters_json).unwrap(), "[]");
    }

    #[test]
    fn test_write_json_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_json(&path, &vec![1, 2, 3]).unwrap();
        let back: Vec<u32> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![1, 2, 3]);

        let err = write_json(&dir.path().join("missing").join("summary.json"), &1).unwrap_err();
        assert!(format!("{err}").starts_with("Failed to write"));
    }
}
