//! Plain-text Suspicious Transaction Report (STR) for one cluster.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::case::FeaturedCase;
use crate::cluster::{Cluster, PatternTag};
use crate::transaction::{datetime_format, Transaction};

const NUMERALS: [&str; 6] = ["I", "II", "III", "IV", "V", "VI"];

/// Transactions listed in the suspicious transactions section.
pub const DEFAULT_TOP_TRANSACTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Critical,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
        }
    }
}

/// `Rp 45,000,000,000`
pub fn format_idr(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("Rp {grouped}")
}

fn describe(tag: PatternTag) -> &'static str {
    match tag {
        PatternTag::StructuringDetected => {
            "Repeated amounts just under the Rp 50,000,000 reporting threshold"
        }
        PatternTag::RapidSuccession => "Several transactions less than 24 hours apart",
        PatternTag::RoundAmounts => "Majority of amounts are exact multiples of Rp 1,000,000",
    }
}

/// Counterparty of the primary entity, aggregated over the cluster.
struct Exposure<'a> {
    name: &'a str,
    npwp: &'a str,
    count: usize,
    total: u64,
}

pub struct StrReport<'a> {
    cluster: &'a Cluster,
    members: Vec<&'a Transaction>,
    case: &'a FeaturedCase,
    date: NaiveDate,
    top: usize,
}

impl<'a> StrReport<'a> {
    pub fn new(
        cluster: &'a Cluster,
        batch: &'a [Transaction],
        case: &'a FeaturedCase,
        date: NaiveDate,
    ) -> Self {
        Self {
            cluster,
            members: cluster.transactions(batch),
            case,
            date,
            top: DEFAULT_TOP_TRANSACTIONS,
        }
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = top;
        self
    }

    pub fn is_featured(&self) -> bool {
        self.case.involves(&self.cluster.primary_entity)
    }

    pub fn priority(&self) -> Priority {
        if self.is_featured() {
            Priority::Critical
        } else {
            Priority::High
        }
    }

    /// Display name of the primary entity as it appears in the batch.
    pub fn entity_name(&self) -> &str {
        let npwp = self.cluster.primary_entity.as_str();
        self.members
            .iter()
            .find_map(|tx| {
                if tx.sender_npwp == npwp {
                    Some(tx.sender_name.as_str())
                } else if tx.receiver_npwp == npwp {
                    Some(tx.receiver_name.as_str())
                } else {
                    None
                }
            })
            .unwrap_or(npwp)
    }

    /// Suggested file name, `STR_<cluster>_<yyyymmdd>.txt`.
    pub fn file_name(&self) -> String {
        format!(
            "STR_{}_{}.txt",
            self.cluster.cluster_id,
            self.date.format("%Y%m%d")
        )
    }

    /// Where to save the report: `target` itself, or [`Self::file_name`]
    /// inside it when `target` is an existing directory.
    pub fn output_path(&self, target: &Path) -> PathBuf {
        if target.is_dir() {
            target.join(self.file_name())
        } else {
            target.to_path_buf()
        }
    }

    fn exposures(&self) -> Vec<Exposure<'a>> {
        let npwp = self.cluster.primary_entity.as_str();
        let mut by_party: HashMap<&str, Exposure<'a>> = HashMap::new();
        for &tx in &self.members {
            let (name, other) = if tx.sender_npwp == npwp {
                (tx.receiver_name.as_str(), tx.receiver_npwp.as_str())
            } else {
                (tx.sender_name.as_str(), tx.sender_npwp.as_str())
            };
            let entry = by_party.entry(other).or_insert(Exposure {
                name,
                npwp: other,
                count: 0,
                total: 0,
            });
            entry.count += 1;
            entry.total = entry.total.saturating_add(tx.amount_idr);
        }
        let mut exposures: Vec<Exposure<'a>> = by_party.into_values().collect();
        exposures.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.npwp.cmp(b.npwp)));
        exposures
    }

    fn top_transactions(&self) -> Vec<&'a Transaction> {
        let mut ranked = self.members.clone();
        ranked.sort_by(|a, b| {
            b.risk_score()
                .cmp(&a.risk_score())
                .then_with(|| b.amount_idr.cmp(&a.amount_idr))
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });
        ranked.truncate(self.top);
        ranked
    }

    fn evidence(&self) -> Vec<String> {
        let c = self.cluster;
        if self.is_featured() {
            let case = self.case;
            return vec![
                format!(
                    "Citra satelit: overlap {}% dengan {} ({} ha)",
                    case.site.overlap_percent, case.site.protected_area, case.site.overlap_hectares
                ),
                format!(
                    "Transfer {} ke {} sehari setelah clearing",
                    format_idr(case.placement_amount),
                    case.shell_name
                ),
                format!(
                    "Beneficial owner sama: {} (NIK: {})",
                    case.beneficial_owner, case.owner_nik
                ),
                format!(
                    "Pola structuring: {} transaksi senilai total {}",
                    case.structuring_amounts.len(),
                    format_idr(case.structuring_total())
                ),
                "Shell company: modal disetor rendah, alamat berbeda".to_string(),
            ];
        }

        let mut evidence = vec![format!(
            "{} transaksi berisiko tinggi senilai {} terdeteksi sistem",
            c.transaction_count,
            format_idr(c.total_amount)
        )];
        if !c.pattern_analysis.is_empty() {
            evidence.push("Pola transaksi tidak wajar".to_string());
        }
        evidence.push("Potensi jaringan shell company".to_string());
        evidence
    }

    fn next_actions(&self) -> Vec<String> {
        if self.is_featured() {
            let case = self.case;
            return vec![
                format!(
                    "Verifikasi lapangan koordinat overlap ({})",
                    case.site.coordinates()
                ),
                "Koordinasi dengan KLHK untuk status izin HGU".to_string(),
                format!(
                    "Request rekening koran {} dan {}",
                    case.company_name, case.shell_name
                ),
                format!(
                    "Background check {}: kepemilikan multi-entity",
                    case.beneficial_owner
                ),
                "Persiapan STR dan koordinasi dengan Kejaksaan".to_string(),
            ];
        }
        vec![
            "Analisis mendalam pola transaksi".to_string(),
            "Trace beneficial ownership".to_string(),
            "Review rekening koran terkait".to_string(),
        ]
    }

    fn write_entities(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_featured() {
            let case = self.case;
            writeln!(f, "1. {}", case.company_name)?;
            writeln!(f, "   - NPWP: {}", case.company_npwp)?;
            writeln!(f, "   - Direktur: {} (NIK: {})", case.beneficial_owner, case.owner_nik)?;
            writeln!(f, "   - Alamat: {}", case.company_address)?;
            writeln!(f)?;
            writeln!(f, "2. {} (Shell Company)", case.shell_name)?;
            writeln!(f, "   - NPWP: {}", case.shell_npwp)?;
            writeln!(f, "   - Direktur: {} (NIK: {})", case.beneficial_owner, case.owner_nik)?;
            writeln!(f, "   - Alamat: {}", case.shell_address)?;
            return Ok(());
        }

        writeln!(f, "1. {} (primary)", self.entity_name())?;
        writeln!(f, "   - NPWP: {}", self.cluster.primary_entity)?;
        for (i, exposure) in self.exposures().iter().take(self.top).enumerate() {
            writeln!(f, "{}. {}", i + 2, exposure.name)?;
            writeln!(f, "   - NPWP: {}", exposure.npwp)?;
            writeln!(
                f,
                "   - {} transaksi, total {}",
                exposure.count,
                format_idr(exposure.total)
            )?;
        }
        Ok(())
    }
}

fn heading(f: &mut fmt::Formatter<'_>, numeral: Option<&&str>, title: &str) -> fmt::Result {
    let label = format!("{}. {}", numeral.copied().unwrap_or("-"), title);
    writeln!(f)?;
    writeln!(f, "{label}")?;
    writeln!(f, "{}", "-".repeat(label.len()))
}

impl fmt::Display for StrReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.cluster;
        let featured = self.is_featured();
        let mut numerals = NUMERALS.iter();

        writeln!(f, "SUSPICIOUS TRANSACTION REPORT (STR)")?;
        writeln!(f, "=======================================")?;
        writeln!(f)?;
        writeln!(f, "ALERT ID: {}", c.cluster_id)?;
        writeln!(f, "DATE: {}", self.date.format("%Y-%m-%d"))?;
        writeln!(f, "PRIORITY: {}", self.priority().as_str())?;
        if featured {
            writeln!(f, "CASE TYPE: Environmental Crime + Money Laundering")?;
        }

        heading(f, numerals.next(), "EXECUTIVE SUMMARY")?;
        if featured {
            let case = self.case;
            writeln!(
                f,
                "{} telah melakukan clearing ilegal terhadap {} seluas {} ha ({}% overlap)",
                case.company_name,
                case.site.protected_area,
                case.site.overlap_hectares,
                case.site.overlap_percent
            )?;
            writeln!(
                f,
                "dan mencuci hasil kejahatan melalui {} dengan total transaksi",
                case.shell_name
            )?;
            writeln!(f, "mencurigakan {}.", format_idr(c.total_amount))?;
        } else {
            writeln!(
                f,
                "{} ({}) terlibat dalam {} transaksi berisiko tinggi senilai {}",
                self.entity_name(),
                c.primary_entity,
                c.transaction_count,
                format_idr(c.total_amount)
            )?;
            writeln!(
                f,
                "antara {} dan {}, rata-rata skor risiko {:.1}.",
                c.date_range.start.format(datetime_format::FORMAT),
                c.date_range.end.format(datetime_format::FORMAT),
                c.avg_risk_score
            )?;
        }

        heading(f, numerals.next(), "ENTITIES INVOLVED")?;
        self.write_entities(f)?;

        heading(f, numerals.next(), "SUSPICIOUS TRANSACTIONS")?;
        for (i, tx) in self.top_transactions().iter().enumerate() {
            writeln!(
                f,
                "{}. {}: {} ({})",
                i + 1,
                tx.transaction_id,
                format_idr(tx.amount_idr),
                tx.transaction_type
            )?;
            writeln!(
                f,
                "   Tanggal: {}",
                tx.transaction_date.format(datetime_format::FORMAT)
            )?;
            writeln!(f, "   From: {} -> {}", tx.sender_name, tx.receiver_name)?;
            writeln!(f, "   Risk score: {}", tx.risk_score())?;
        }
        if c.transaction_count > self.top {
            writeln!(
                f,
                "... and {} more transactions",
                c.transaction_count - self.top
            )?;
        }

        heading(f, numerals.next(), "DETECTED PATTERNS")?;
        if c.pattern_analysis.is_empty() {
            writeln!(f, "No heuristic pattern tags; cluster raised on volume of high-risk activity.")?;
        }
        for tag in &c.pattern_analysis {
            writeln!(f, "- {}: {}", tag, describe(*tag))?;
        }

        if featured {
            let site = &self.case.site;
            heading(f, numerals.next(), "ENVIRONMENTAL EVIDENCE")?;
            writeln!(f, "- Satellite imagery confirms illegal forest clearing")?;
            writeln!(f, "- Region: {}", site.region)?;
            writeln!(f, "- Coordinates: {}", site.coordinates())?;
            writeln!(f, "- Protected area: {}", site.protected_area)?;
            writeln!(
                f,
                "- Overlap area: {} hectares ({}%)",
                site.overlap_hectares, site.overlap_percent
            )?;
        }

        heading(f, numerals.next(), "EVIDENCE AND NEXT ACTIONS")?;
        writeln!(f, "Evidence:")?;
        for item in self.evidence() {
            writeln!(f, "- {item}")?;
        }
        writeln!(f, "Next actions:")?;
        for (i, action) in self.next_actions().iter().enumerate() {
            writeln!(f, "{}. {}", i + 1, action)?;
        }

        writeln!(f)?;
        writeln!(f, "Prepared by: JALAK-HIJAU System")?;
        writeln!(f, "Investigation Team: PPATK Environmental Crime Unit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{detect_clusters, ClusterRules};
    use crate::party::Counterparty;
    use crate::scoring::RiskWeights;
    use crate::transaction::{Category, Channel, TransactionDraft, TransactionType};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn generic_batch() -> Vec<Transaction> {
        let party = |name: &str, npwp: &str, risk| Counterparty {
            account_number: format!("ACC_{npwp}"),
            name: name.to_string(),
            npwp: npwp.to_string(),
            risk_score: risk,
        };
        (0..4)
            .map(|i| {
                Transaction::new(
                    TransactionDraft {
                        transaction_id: format!("TXN_{:06}", i + 1),
                        transaction_date: date().and_hms_opt(9 + i, 0, 0).unwrap(),
                        sender: party("PT FAJAR SAWIT MANDIRI", "10.100.100.1-100.100", 40),
                        receiver: party("PT PRIMA JAYA TRADING", "20.200.200.2-200.200", 85),
                        amount_idr: 46_000_000 + u64::from(i) * 500_000,
                        transaction_type: TransactionType::CashDeposit,
                        category: Category::SuspiciousStructuring,
                        bank_code: "009".to_string(),
                        channel: Channel::Atm,
                        cross_border: false,
                    },
                    &RiskWeights::default(),
                )
            })
            .collect()
    }

    #[test]
    fn test_format_idr() {
        assert_eq!(format_idr(0), "Rp 0");
        assert_eq!(format_idr(999), "Rp 999");
        assert_eq!(format_idr(1_000), "Rp 1,000");
        assert_eq!(format_idr(45_000_000_000), "Rp 45,000,000,000");
    }

    #[test]
    fn test_generic_report_is_high_priority() {
        let batch = generic_batch();
        let clusters = detect_clusters(&batch, &ClusterRules::default());
        let case = FeaturedCase::default();
        let report = StrReport::new(&clusters[0], &batch, &case, date()).with_top(3);

        assert_eq!(report.priority(), Priority::High);
        assert_eq!(report.entity_name(), "PT FAJAR SAWIT MANDIRI");
        assert_eq!(report.file_name(), "STR_CLUSTER_001_20250615.txt");

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            report.output_path(dir.path()),
            dir.path().join("STR_CLUSTER_001_20250615.txt")
        );
        let file = dir.path().join("alert.txt");
        assert_eq!(report.output_path(&file), file);

        let text = report.to_string();
        assert!(text.contains("PRIORITY: HIGH"));
        assert!(text.contains("I. EXECUTIVE SUMMARY"));
        assert!(text.contains("IV. DETECTED PATTERNS"));
        assert!(text.contains("V. EVIDENCE AND NEXT ACTIONS"));
        assert!(text.contains("STRUCTURING_DETECTED"));
        assert!(text.contains("... and 1 more transactions"));
        assert!(!text.contains("ENVIRONMENTAL EVIDENCE"));
    }

    #[test]
    fn test_huge_exposure_does_not_overflow() {
        let batch: Vec<Transaction> = generic_batch()
            .into_iter()
            .map(|mut tx| {
                tx.amount_idr = 10_000_000_000_000_000_000;
                tx
            })
            .collect();
        let clusters = detect_clusters(&batch, &ClusterRules::default());
        let case = FeaturedCase::default();
        let text = StrReport::new(&clusters[0], &batch, &case, date()).to_string();
        assert!(text.contains(&format_idr(u64::MAX)));
    }

    #[test]
    fn test_featured_report_is_critical() {
        let case = FeaturedCase::default();
        let anchor = date().and_hms_opt(12, 0, 0).unwrap();
        let batch = case.transactions(anchor, &RiskWeights::default()).unwrap();
        let clusters = detect_clusters(&batch, &ClusterRules::default());
        let report = StrReport::new(&clusters[0], &batch, &case, date());

        assert_eq!(report.priority(), Priority::Critical);
        let text = report.to_string();
        assert!(text.contains("PRIORITY: CRITICAL"));
        assert!(text.contains("CASE TYPE: Environmental Crime + Money Laundering"));
        assert!(text.contains("V. ENVIRONMENTAL EVIDENCE"));
        assert!(text.contains("VI. EVIDENCE AND NEXT ACTIONS"));
        assert!(text.contains("0.52°S, 101.43°E"));
        assert!(text.contains("Ahmad Wijaya (NIK: 1471010101800001)"));
        assert!(text.contains("TXN_CASE_001: Rp 45,000,000,000"));
    }
}
