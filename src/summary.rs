//! Batch summary record written next to the tables.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cluster::{Cluster, DateRange};
use crate::scoring::RiskWeights;
use crate::transaction::Transaction;

/// Aggregate counts and sums for one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_transactions: usize,
    /// Transactions scoring above the flag threshold
    pub high_risk_transactions: usize,
    /// Saturates at `u64::MAX`
    pub total_amount_idr: u64,
    pub suspicious_clusters: usize,
    pub flagged_transactions: usize,
    pub cross_border_transactions: usize,
    pub average_risk_score: f64,
    /// `None` for an empty batch
    pub date_range: Option<DateRange>,
    /// Order-independent commitment to every `(transaction_id, risk_score)`
    pub scores_digest: String,
}

impl Summary {
    pub fn compute(transactions: &[Transaction], clusters: &[Cluster], weights: &RiskWeights) -> Self {
        let total = transactions.len();
        let score_sum: u64 = transactions.iter().map(|t| u64::from(t.risk_score())).sum();

        Self {
            total_transactions: total,
            high_risk_transactions: high_risk(transactions, weights).count(),
            total_amount_idr: transactions
                .iter()
                .map(|t| t.amount_idr)
                .fold(0, u64::saturating_add),
            suspicious_clusters: clusters.len(),
            flagged_transactions: transactions.iter().filter(|t| t.is_flagged()).count(),
            cross_border_transactions: transactions.iter().filter(|t| t.cross_border).count(),
            average_risk_score: if total == 0 {
                0.0
            } else {
                score_sum as f64 / total as f64
            },
            date_range: DateRange::spanning(transactions.iter().map(|t| t.transaction_date)),
            scores_digest: scores_digest(transactions),
        }
    }

    pub fn high_risk_share(&self) -> f64 {
        if self.total_transactions == 0 {
            0.0
        } else {
            self.high_risk_transactions as f64 / self.total_transactions as f64
        }
    }
}

/// Transactions above the flag threshold, in batch order.
pub fn high_risk<'a>(
    transactions: &'a [Transaction],
    weights: &'a RiskWeights,
) -> impl Iterator<Item = &'a Transaction> + 'a {
    transactions
        .iter()
        .filter(move |t| t.risk_score() > weights.flag_threshold)
}

/// SHA-256 over the sorted `(id, score)` pairs, so reordering a batch does
/// not change it but any rescoring does.
pub fn scores_digest(transactions: &[Transaction]) -> String {
    let mut pairs: Vec<(&str, u8)> = transactions
        .iter()
        .map(|t| (t.transaction_id.as_str(), t.risk_score()))
        .collect();
    pairs.sort_unstable();

    let canonical = serde_json::to_string(&pairs).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
