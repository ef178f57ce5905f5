//! Additive transaction risk scoring.
//!
//! Four components are summed and clamped:
//! - amount tier (very large, large, or just under the reporting threshold)
//! - transaction type weight
//! - pattern category weight
//! - counterparty contribution `(sender_risk + receiver_risk) / divisor`
//!
//! Every constant lives in [`RiskWeights`] so a deployment can tune the
//! thresholds from the `[scoring]` config section.

use std::collections::BTreeMap;

use eyre::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::transaction::{Category, TransactionType};

/// Half-open amount band `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBand {
    pub low: u64,
    pub high: u64,
}

impl AmountBand {
    /// Band just under the 50M IDR cash reporting threshold.
    pub const STRUCTURING: AmountBand = AmountBand {
        low: 45_000_000,
        high: 50_000_000,
    };

    pub fn contains(&self, amount: u64) -> bool {
        self.low <= amount && amount < self.high
    }
}

impl Default for AmountBand {
    fn default() -> Self {
        Self::STRUCTURING
    }
}

/// Fixed points per pattern category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub legitimate: u32,
    pub suspicious_structuring: u32,
    pub suspicious_large: u32,
    pub layering: u32,
}

impl CategoryWeights {
    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::Legitimate => self.legitimate,
            Category::SuspiciousStructuring => self.suspicious_structuring,
            Category::SuspiciousLarge => self.suspicious_large,
            Category::Layering => self.layering,
        }
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            legitimate: 0,
            suspicious_structuring: 40,
            suspicious_large: 35,
            layering: 45,
        }
    }
}

fn default_type_weights() -> BTreeMap<String, u32> {
    [
        ("CASH_DEPOSIT", 25),
        ("LARGE_TRANSFER", 20),
        ("FOREIGN_EXCHANGE", 30),
        ("INTER_COMPANY_TRANSFER", 15),
        ("INVESTMENT", 10),
        ("SALARY_PAYMENT", 0),
        ("SUPPLIER_PAYMENT", 5),
        ("TAX_PAYMENT", 0),
    ]
    .into_iter()
    .map(|(label, points)| (label.to_string(), points))
    .collect()
}

/// Scoring parameters (`[scoring]` config section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Amount at or above which `very_large_points` apply
    pub very_large_amount: u64,
    pub very_large_points: u32,
    /// Amount at or above which `large_points` apply
    pub large_amount: u64,
    pub large_points: u32,
    pub structuring_band: AmountBand,
    pub structuring_points: u32,
    /// Points per transaction type label
    pub type_weights: BTreeMap<String, u32>,
    /// Points for labels missing from `type_weights`
    pub default_type_weight: u32,
    pub category_weights: CategoryWeights,
    pub counterparty_divisor: f64,
    pub max_score: u8,
    /// Scores strictly above this are flagged
    pub flag_threshold: u8,
    /// Mandatory reporting threshold (IDR)
    pub reporting_threshold: u64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            very_large_amount: 1_000_000_000,
            very_large_points: 30,
            large_amount: 500_000_000,
            large_points: 20,
            structuring_band: AmountBand::STRUCTURING,
            structuring_points: 25,
            type_weights: default_type_weights(),
            default_type_weight: 10,
            category_weights: CategoryWeights::default(),
            counterparty_divisor: 4.0,
            max_score: 100,
            flag_threshold: 70,
            reporting_threshold: 50_000_000,
        }
    }
}

/// The fields a score is derived from.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub amount: u64,
    pub transaction_type: &'a TransactionType,
    pub category: Category,
    pub sender_risk: u8,
    pub receiver_risk: u8,
}

/// Per-component contributions before truncation and clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub amount_tier: u32,
    pub transaction_type: u32,
    pub category: u32,
    pub counterparty: f64,
}

impl ScoreBreakdown {
    pub fn raw_total(&self) -> f64 {
        f64::from(self.amount_tier + self.transaction_type + self.category) + self.counterparty
    }
}

impl RiskWeights {
    /// Reject parameter sets the scorer cannot use.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.counterparty_divisor.is_finite() && self.counterparty_divisor > 0.0,
            "scoring.counterparty_divisor must be a positive number, got {}",
            self.counterparty_divisor
        );
        ensure!(
            self.structuring_band.low < self.structuring_band.high,
            "scoring.structuring_band is empty: [{}, {})",
            self.structuring_band.low,
            self.structuring_band.high
        );
        ensure!(
            self.flag_threshold <= self.max_score,
            "scoring.flag_threshold {} exceeds max_score {}",
            self.flag_threshold,
            self.max_score
        );
        Ok(())
    }

    pub fn amount_points(&self, amount: u64) -> u32 {
        if amount >= self.very_large_amount {
            self.very_large_points
        } else if amount >= self.large_amount {
            self.large_points
        } else if self.structuring_band.contains(amount) {
            self.structuring_points
        } else {
            0
        }
    }

    pub fn type_points(&self, transaction_type: &TransactionType) -> u32 {
        self.type_weights
            .get(transaction_type.as_str())
            .copied()
            .unwrap_or(self.default_type_weight)
    }

    pub fn breakdown(&self, input: &ScoreInput<'_>) -> ScoreBreakdown {
        ScoreBreakdown {
            amount_tier: self.amount_points(input.amount),
            transaction_type: self.type_points(input.transaction_type),
            category: self.category_weights.get(input.category),
            counterparty: (f64::from(input.sender_risk) + f64::from(input.receiver_risk))
                / self.counterparty_divisor,
        }
    }

    /// Integer risk score in `[0, max_score]`.
    pub fn score(&self, input: &ScoreInput<'_>) -> u8 {
        let total = self.breakdown(input).raw_total().trunc();
        total.clamp(0.0, f64::from(self.max_score)) as u8
    }

    pub fn is_flagged(&self, score: u8) -> bool {
        score > self.flag_threshold
    }
}
