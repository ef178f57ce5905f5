//! The featured investigation case.
//!
//! A plantation front company clears protected forest and moves the
//! proceeds into a shell company controlled by the same beneficial owner:
//! one large placement, then a run of transfers just under the large-amount
//! threshold. All of it is configuration data; the series is rebuilt
//! deterministically from the anchor date.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use eyre::{ensure, eyre, Result};
use serde::{Deserialize, Serialize};

use crate::party::{Company, Counterparty};
use crate::scoring::RiskWeights;
use crate::transaction::{Category, Channel, Transaction, TransactionDraft, TransactionType};

/// Longest configurable gap between the placement and the anchor.
pub const MAX_PLACEMENT_DAYS: i64 = 3_650;

/// Longest configurable gap between two structuring transfers.
pub const MAX_INTERVAL_HOURS: i64 = 24 * 365;

/// Environmental facts quoted in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteEvidence {
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub protected_area: String,
    pub overlap_hectares: u32,
    pub overlap_percent: f64,
}

impl Default for SiteEvidence {
    fn default() -> Self {
        Self {
            region: "Riau".to_string(),
            latitude: -0.52,
            longitude: 101.43,
            protected_area: "Hutan Lindung Riau Tengah".to_string(),
            overlap_hectares: 5_100,
            overlap_percent: 35.2,
        }
    }
}

impl SiteEvidence {
    /// `0.52°S, 101.43°E` style coordinates.
    pub fn coordinates(&self) -> String {
        let ns = if self.latitude < 0.0 { 'S' } else { 'N' };
        let ew = if self.longitude < 0.0 { 'W' } else { 'E' };
        format!(
            "{:.2}°{}, {:.2}°{}",
            self.latitude.abs(),
            ns,
            self.longitude.abs(),
            ew
        )
    }
}

/// `[featured_case]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturedCase {
    pub enabled: bool,
    pub company_name: String,
    pub company_npwp: String,
    pub company_risk: u8,
    pub company_address: String,
    pub shell_name: String,
    pub shell_npwp: String,
    pub shell_risk: u8,
    pub shell_address: String,
    pub beneficial_owner: String,
    pub owner_nik: String,
    /// Placement into the shell, IDR
    pub placement_amount: u64,
    pub placement_days_before_anchor: i64,
    /// Follow-up transfers, IDR
    pub structuring_amounts: Vec<u64>,
    pub structuring_interval_hours: i64,
    pub site: SiteEvidence,
}

impl Default for FeaturedCase {
    fn default() -> Self {
        Self {
            enabled: true,
            company_name: "PT SAWIT NUSANTARA".to_string(),
            company_npwp: "73.590.760.9-174.110".to_string(),
            company_risk: 95,
            company_address: "Jalan Sawit Raya No. 10, Pekanbaru, Riau".to_string(),
            shell_name: "PT KARYA UTAMA CONSULTING".to_string(),
            shell_npwp: "82.591.670.8-175.210".to_string(),
            shell_risk: 90,
            shell_address: "Jalan Sudirman No. 100, Jakarta Pusat".to_string(),
            beneficial_owner: "Ahmad Wijaya".to_string(),
            owner_nik: "1471010101800001".to_string(),
            placement_amount: 45_000_000_000,
            placement_days_before_anchor: 14,
            structuring_amounts: vec![
                480_000_000,
                450_000_000,
                420_000_000,
                490_000_000,
                360_000_000,
            ],
            structuring_interval_hours: 18,
            site: SiteEvidence::default(),
        }
    }
}

impl FeaturedCase {
    pub fn front_company(&self) -> Company {
        Company {
            company_id: "CASE_FRONT".to_string(),
            nama_perseroan: self.company_name.clone(),
            npwp_perusahaan: self.company_npwp.clone(),
            is_suspicious: false,
            risk_score: self.company_risk,
        }
    }

    pub fn shell_company(&self) -> Company {
        Company {
            company_id: "CASE_SHELL".to_string(),
            nama_perseroan: self.shell_name.clone(),
            npwp_perusahaan: self.shell_npwp.clone(),
            is_suspicious: true,
            risk_score: self.shell_risk,
        }
    }

    /// Whether `npwp` belongs to one of the case's companies.
    pub fn involves(&self, npwp: &str) -> bool {
        self.enabled && (npwp == self.company_npwp || npwp == self.shell_npwp)
    }

    pub fn structuring_total(&self) -> u64 {
        self.structuring_amounts
            .iter()
            .fold(0, |total, &amount| total.saturating_add(amount))
    }

    /// Reject settings the series cannot be built from. A disabled case is
    /// never checked.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        ensure!(
            self.company_risk <= 100 && self.shell_risk <= 100,
            "featured_case company and shell risk must be at most 100"
        );
        ensure!(
            (0..=MAX_PLACEMENT_DAYS).contains(&self.placement_days_before_anchor),
            "featured_case.placement_days_before_anchor must be within 0..={MAX_PLACEMENT_DAYS}, got {}",
            self.placement_days_before_anchor
        );
        ensure!(
            (1..=MAX_INTERVAL_HOURS).contains(&self.structuring_interval_hours),
            "featured_case.structuring_interval_hours must be within 1..={MAX_INTERVAL_HOURS}, got {}",
            self.structuring_interval_hours
        );
        ensure!(
            self.company_npwp != self.shell_npwp,
            "featured_case company and shell must have different NPWPs"
        );
        Ok(())
    }

    /// Placement followed by the structuring run, scored with `weights`.
    ///
    /// The placement lands at 10:00 `placement_days_before_anchor` days
    /// before `anchor`; the first transfer follows one day later and the
    /// rest are spaced `structuring_interval_hours` apart.
    pub fn transactions(
        &self,
        anchor: NaiveDateTime,
        weights: &RiskWeights,
    ) -> Result<Vec<Transaction>> {
        if !self.enabled {
            return Ok(Vec::new());
        }
        self.validate()?;

        let front: Counterparty = self.front_company().counterparty();
        let shell: Counterparty = self.shell_company().counterparty();
        let placement_at = Duration::try_days(self.placement_days_before_anchor)
            .and_then(|back| anchor.checked_sub_signed(back))
            .ok_or_else(|| eyre!("featured case placement falls outside the calendar"))?
            .date()
            .and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default());

        let mut drafts = vec![TransactionDraft {
            transaction_id: case_id(1),
            transaction_date: placement_at,
            sender: front.clone(),
            receiver: shell.clone(),
            amount_idr: self.placement_amount,
            transaction_type: TransactionType::LargeTransfer,
            category: Category::SuspiciousLarge,
            bank_code: "008".to_string(),
            channel: Channel::Rtgs,
            cross_border: false,
        }];

        for (i, &amount) in self.structuring_amounts.iter().enumerate() {
            let transaction_date = i64::try_from(i)
                .ok()
                .and_then(|i| self.structuring_interval_hours.checked_mul(i))
                .and_then(|hours| hours.checked_add(24))
                .and_then(Duration::try_hours)
                .and_then(|offset| placement_at.checked_add_signed(offset))
                .ok_or_else(|| eyre!("featured case transfer {} falls outside the calendar", i + 1))?;
            drafts.push(TransactionDraft {
                transaction_id: case_id(i + 2),
                transaction_date,
                sender: front.clone(),
                receiver: shell.clone(),
                amount_idr: amount,
                transaction_type: TransactionType::Transfer,
                category: Category::SuspiciousStructuring,
                bank_code: "008".to_string(),
                channel: Channel::InternetBanking,
                cross_border: false,
            });
        }

        Ok(drafts
            .into_iter()
            .map(|draft| Transaction::new(draft, weights))
            .collect())
    }
}

fn case_id(seq: usize) -> String {
    format!("TXN_CASE_{seq:03}")
}
