//! Suspicious cluster detection.
//!
//! High-risk transactions are grouped by the NPWP of every party they
//! involve. A party that shows up in enough of them becomes a cluster, tagged
//! with the heuristic patterns found in its group.

use std::collections::HashMap;
use std::fmt;

use chrono::{Duration, NaiveDateTime};
use eyre::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::scoring::AmountBand;
use crate::transaction::{datetime_format, Transaction};

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Detection parameters (`[clusters]` config section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterRules {
    /// Transactions scoring strictly above this are considered
    pub risk_threshold: u8,
    /// Minimum group size for a party to become a cluster
    pub min_transactions: usize,
    pub structuring_band: AmountBand,
    /// Band hits needed for `STRUCTURING_DETECTED`
    pub min_structuring: usize,
    pub rapid_window_hours: i64,
    /// Close consecutive pairs needed for `RAPID_SUCCESSION`
    pub min_rapid_pairs: usize,
    pub round_unit: u64,
    /// Share of round amounts that must be exceeded for `ROUND_AMOUNTS`
    pub round_ratio: f64,
}

impl Default for ClusterRules {
    fn default() -> Self {
        Self {
            risk_threshold: 60,
            min_transactions: 3,
            structuring_band: AmountBand::STRUCTURING,
            min_structuring: 2,
            rapid_window_hours: 24,
            min_rapid_pairs: 2,
            round_unit: 1_000_000,
            round_ratio: 0.5,
        }
    }
}

impl ClusterRules {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.min_transactions > 0, "clusters.min_transactions must be at least 1");
        ensure!(self.round_unit > 0, "clusters.round_unit must be positive");
        ensure!(
            self.rapid_window().is_some(),
            "clusters.rapid_window_hours must be positive and representable, got {}",
            self.rapid_window_hours
        );
        ensure!(
            (0.0..=1.0).contains(&self.round_ratio),
            "clusters.round_ratio must be within [0, 1], got {}",
            self.round_ratio
        );
        Ok(())
    }

    /// `None` when the configured hours are non-positive or overflow.
    pub fn rapid_window(&self) -> Option<Duration> {
        Duration::try_hours(self.rapid_window_hours).filter(|window| *window > Duration::zero())
    }
}

// ---------------------------------------------------------------------------
// Cluster types
// ---------------------------------------------------------------------------

/// Heuristic pattern found in a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternTag {
    /// Repeated amounts just under the reporting threshold
    StructuringDetected,
    /// Several transactions less than a day apart
    RapidSuccession,
    /// Mostly exact multiples of a round unit
    RoundAmounts,
}

impl PatternTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuringDetected => "STRUCTURING_DETECTED",
            Self::RapidSuccession => "RAPID_SUCCESSION",
            Self::RoundAmounts => "ROUND_AMOUNTS",
        }
    }
}

impl fmt::Display for PatternTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(with = "datetime_format")]
    pub start: NaiveDateTime,
    #[serde(with = "datetime_format")]
    pub end: NaiveDateTime,
}

impl DateRange {
    /// Earliest and latest of `dates`, or `None` when there are none.
    pub fn spanning(dates: impl IntoIterator<Item = NaiveDateTime>) -> Option<Self> {
        dates.into_iter().fold(None, |range, date| {
            Some(match range {
                None => DateRange { start: date, end: date },
                Some(DateRange { start, end }) => DateRange {
                    start: start.min(date),
                    end: end.max(date),
                },
            })
        })
    }
}

/// A party involved in repeated high-risk transactions.
///
/// Transactions are referenced by ID; [`Cluster::transactions`] resolves
/// them against the batch the cluster was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: String,
    /// NPWP of the party the group is keyed on
    pub primary_entity: String,
    pub transaction_count: usize,
    /// Saturates at `u64::MAX`
    pub total_amount: u64,
    pub date_range: DateRange,
    pub transaction_ids: Vec<String>,
    pub avg_risk_score: f64,
    pub pattern_analysis: Vec<PatternTag>,
}

impl Cluster {
    pub fn has_tag(&self, tag: PatternTag) -> bool {
        self.pattern_analysis.contains(&tag)
    }

    /// Members of this cluster, in the order they were grouped.
    pub fn transactions<'a>(&self, batch: &'a [Transaction]) -> Vec<&'a Transaction> {
        let by_id: HashMap<&str, &Transaction> = batch
            .iter()
            .map(|tx| (tx.transaction_id.as_str(), tx))
            .collect();
        self.transaction_ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Group high-risk transactions by party and emit one cluster per party
/// with at least `rules.min_transactions` of them.
///
/// Clusters are numbered in order of the key's first appearance in
/// `transactions`, so the same input always yields the same output.
pub fn detect_clusters(transactions: &[Transaction], rules: &ClusterRules) -> Vec<Cluster> {
    let groups = group_by_party(
        transactions
            .iter()
            .filter(|tx| tx.risk_score() > rules.risk_threshold),
    );
    let candidates = groups.len();

    let clusters: Vec<Cluster> = groups
        .into_iter()
        .filter(|(_, txs)| txs.len() >= rules.min_transactions)
        .enumerate()
        .filter_map(|(i, (entity, txs))| build_cluster(i + 1, entity, &txs, rules))
        .collect();

    tracing::debug!(
        candidates,
        clusters = clusters.len(),
        threshold = rules.risk_threshold,
        "cluster detection finished"
    );

    clusters
}

/// Groups keyed by NPWP, in first-appearance order. A transaction joins the
/// group of each distinct party it involves.
fn group_by_party<'a>(
    transactions: impl Iterator<Item = &'a Transaction>,
) -> Vec<(&'a str, Vec<&'a Transaction>)> {
    let mut slots: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<(&'a str, Vec<&'a Transaction>)> = Vec::new();

    for tx in transactions {
        let sender = tx.sender_npwp.as_str();
        let receiver = tx.receiver_npwp.as_str();
        let keys = std::iter::once(sender).chain((receiver != sender).then_some(receiver));

        for key in keys {
            let idx = match slots.get(key) {
                Some(&idx) => idx,
                None => {
                    groups.push((key, Vec::new()));
                    slots.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[idx].1.push(tx);
        }
    }

    groups
}

fn build_cluster(
    seq: usize,
    entity: &str,
    txs: &[&Transaction],
    rules: &ClusterRules,
) -> Option<Cluster> {
    let date_range = DateRange::spanning(txs.iter().map(|t| t.transaction_date))?;
    let score_sum: u64 = txs.iter().map(|t| u64::from(t.risk_score())).sum();

    Some(Cluster {
        cluster_id: format!("CLUSTER_{seq:03}"),
        primary_entity: entity.to_string(),
        transaction_count: txs.len(),
        total_amount: txs.iter().map(|t| t.amount_idr).fold(0, u64::saturating_add),
        date_range,
        transaction_ids: txs.iter().map(|t| t.transaction_id.clone()).collect(),
        avg_risk_score: score_sum as f64 / txs.len() as f64,
        pattern_analysis: analyze_patterns(txs, rules),
    })
}

/// Tag a group of transactions with every pattern it exhibits.
pub fn analyze_patterns(txs: &[&Transaction], rules: &ClusterRules) -> Vec<PatternTag> {
    let mut patterns = Vec::new();
    if txs.is_empty() {
        return patterns;
    }

    let structuring = txs
        .iter()
        .filter(|t| rules.structuring_band.contains(t.amount_idr))
        .count();
    if structuring >= rules.min_structuring {
        patterns.push(PatternTag::StructuringDetected);
    }

    let mut dates: Vec<NaiveDateTime> = txs.iter().map(|t| t.transaction_date).collect();
    dates.sort();
    let rapid = rules.rapid_window().map_or(0, |window| {
        dates.windows(2).filter(|w| w[1] - w[0] < window).count()
    });
    if rapid >= rules.min_rapid_pairs {
        patterns.push(PatternTag::RapidSuccession);
    }

    let round = txs
        .iter()
        .filter(|t| t.amount_idr % rules.round_unit == 0)
        .count();
    if round as f64 / txs.len() as f64 > rules.round_ratio {
        patterns.push(PatternTag::RoundAmounts);
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::party::Counterparty;
    use crate::scoring::RiskWeights;
    use crate::transaction::{Category, Channel, TransactionDraft, TransactionType};
    use chrono::NaiveDate;

    const FRONT: &str = "73.590.760.9-174.110";
    const SHELL: &str = "82.591.670.8-175.210";

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn party(npwp: &str, risk: u8) -> Counterparty {
        Counterparty {
            account_number: format!("ACC_{npwp}"),
            name: format!("PT {npwp}"),
            npwp: npwp.to_string(),
            risk_score: risk,
        }
    }

    fn tx(id: usize, from: &str, to: &str, amount: u64, when: NaiveDateTime) -> Transaction {
        Transaction::new(
            TransactionDraft {
                transaction_id: format!("TXN_{id:06}"),
                transaction_date: when,
                sender: party(from, 95),
                receiver: party(to, 90),
                amount_idr: amount,
                transaction_type: TransactionType::Transfer,
                category: Category::SuspiciousStructuring,
                bank_code: "008".to_string(),
                channel: Channel::InternetBanking,
                cross_border: false,
            },
            &RiskWeights::default(),
        )
    }

    #[test]
    fn test_structuring_within_hours_example() {
        let txs = vec![
            tx(1, FRONT, SHELL, 46_000_000, at(10, 9)),
            tx(2, FRONT, SHELL, 47_500_000, at(10, 10)),
            tx(3, FRONT, SHELL, 48_200_000, at(10, 11)),
        ];
        let clusters = detect_clusters(&txs, &ClusterRules::default());

        // one per party
        assert_eq!(clusters.len(), 2);
        let front = &clusters[0];
        assert_eq!(front.cluster_id, "CLUSTER_001");
        assert_eq!(front.primary_entity, FRONT);
        assert_eq!(clusters[1].primary_entity, SHELL);
        assert_eq!(front.transaction_count, 3);
        assert_eq!(front.total_amount, 141_700_000);
        assert_eq!(front.date_range.start, at(10, 9));
        assert_eq!(front.date_range.end, at(10, 11));
        assert_eq!(front.transaction_ids, vec!["TXN_000001", "TXN_000002", "TXN_000003"]);
        assert!(front.has_tag(PatternTag::StructuringDetected));
        assert!(front.has_tag(PatternTag::RapidSuccession));
        assert!(!front.has_tag(PatternTag::RoundAmounts));
    }

    #[test]
    fn test_two_transactions_never_cluster() {
        let txs = vec![
            tx(1, FRONT, SHELL, 46_000_000, at(1, 9)),
            tx(2, FRONT, SHELL, 47_000_000, at(2, 9)),
        ];
        assert!(detect_clusters(&txs, &ClusterRules::default()).is_empty());
    }

    #[test]
    fn test_low_scores_are_ignored() {
        let txs = vec![
            tx(1, FRONT, SHELL, 46_000_000, at(1, 9)),
            tx(2, FRONT, SHELL, 47_000_000, at(2, 9)),
            tx(3, FRONT, SHELL, 48_000_000, at(3, 9)).with_risk_score(60),
        ];
        assert!(detect_clusters(&txs, &ClusterRules::default()).is_empty());
    }

    #[test]
    fn test_self_transfer_counts_once() {
        let txs = vec![
            tx(1, FRONT, FRONT, 46_000_000, at(1, 9)),
            tx(2, FRONT, SHELL, 46_000_000, at(5, 9)),
        ];
        assert!(detect_clusters(&txs, &ClusterRules::default()).is_empty());
    }

    #[test]
    fn test_rapid_succession_needs_two_close_pairs() {
        let rules = ClusterRules::default();
        let a = tx(1, FRONT, SHELL, 300_000_000, at(1, 9));
        let b = tx(2, FRONT, SHELL, 300_000_000, at(1, 20));
        let c = tx(3, FRONT, SHELL, 300_000_000, at(5, 9));
        assert!(!analyze_patterns(&[&a, &b, &c], &rules).contains(&PatternTag::RapidSuccession));

        // exactly 24h apart is not rapid
        let d = tx(4, FRONT, SHELL, 300_000_000, at(1, 20) + Duration::hours(24));
        assert!(!analyze_patterns(&[&c, &b, &d], &rules).contains(&PatternTag::RapidSuccession));

        let e = tx(5, FRONT, SHELL, 300_000_000, at(2, 19));
        let tags = analyze_patterns(&[&e, &a, &b], &rules);
        assert!(tags.contains(&PatternTag::RapidSuccession));
    }

    #[test]
    fn test_round_amounts_need_majority() {
        let rules = ClusterRules::default();
        let a = tx(1, FRONT, SHELL, 300_000_000, at(1, 9));
        let b = tx(2, FRONT, SHELL, 300_000_001, at(3, 9));
        assert!(!analyze_patterns(&[&a, &b], &rules).contains(&PatternTag::RoundAmounts));

        let c = tx(3, FRONT, SHELL, 5_000_000_000, at(6, 9));
        assert_eq!(analyze_patterns(&[&a, &b, &c], &rules), vec![PatternTag::RoundAmounts]);
    }

    #[test]
    fn test_cluster_resolves_members() {
        let txs = vec![
            tx(1, FRONT, SHELL, 46_000_000, at(1, 9)),
            tx(2, FRONT, SHELL, 47_000_000, at(2, 9)),
            tx(3, FRONT, SHELL, 48_000_000, at(3, 9)),
        ];
        let clusters = detect_clusters(&txs, &ClusterRules::default());
        let members = clusters[0].transactions(&txs);
        assert_eq!(members.len(), 3);
        assert!(members.iter().all(|t| t.involves(FRONT)));
        assert_eq!(clusters[0].avg_risk_score, 100.0);
    }

    #[test]
    fn test_huge_amounts_saturate_total() {
        let huge = 10_000_000_000_000_000_000;
        let txs: Vec<Transaction> = (1..=3)
            .map(|i| tx(i, FRONT, SHELL, huge, at(i as u32, 9)))
            .collect();
        let clusters = detect_clusters(&txs, &ClusterRules::default());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].total_amount, u64::MAX);
    }

    #[test]
    fn test_rules_validation() {
        assert!(ClusterRules::default().validate().is_ok());
        let rules = ClusterRules {
            round_unit: 0,
            ..ClusterRules::default()
        };
        assert!(rules.validate().is_err());

        for hours in [0, -24, i64::MAX / 1000] {
            let rules = ClusterRules {
                rapid_window_hours: hours,
                ..ClusterRules::default()
            };
            assert!(rules.validate().is_err(), "{hours} accepted");
        }
    }

    #[test]
    fn test_unrepresentable_window_finds_no_rapid_pairs() {
        let rules = ClusterRules {
            rapid_window_hours: i64::MAX / 1000,
            ..ClusterRules::default()
        };
        let a = tx(1, FRONT, SHELL, 300_000_000, at(1, 9));
        let b = tx(2, FRONT, SHELL, 300_000_000, at(1, 10));
        let c = tx(3, FRONT, SHELL, 300_000_000, at(1, 11));
        assert!(!analyze_patterns(&[&a, &b, &c], &rules).contains(&PatternTag::RapidSuccession));
    }
}
