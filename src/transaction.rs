//! Core transaction types.
//!
//! Defines the pattern categories with their type vocabularies and amount
//! ranges, the transaction record written to the flat tables, and the
//! construction path that derives the risk score and flags.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::party::Counterparty;
use crate::scoring::{RiskWeights, ScoreInput};

// ---------------------------------------------------------------------------
// Pattern categories
// ---------------------------------------------------------------------------

/// Pattern category a transaction was sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Legitimate,
    /// Amounts just under the reporting threshold
    SuspiciousStructuring,
    /// Large transfers into shell companies
    SuspiciousLarge,
    /// Funds moved through intermediary entities
    Layering,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Self::Legitimate,
        Self::SuspiciousStructuring,
        Self::SuspiciousLarge,
        Self::Layering,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legitimate => "legitimate",
            Self::SuspiciousStructuring => "suspicious_structuring",
            Self::SuspiciousLarge => "suspicious_large",
            Self::Layering => "layering",
        }
    }

    /// Transaction types sampled for this category.
    pub fn types(&self) -> &'static [TransactionType] {
        match self {
            Self::Legitimate => LEGITIMATE_TYPES,
            Self::SuspiciousStructuring => STRUCTURING_TYPES,
            Self::SuspiciousLarge => LARGE_TYPES,
            Self::Layering => LAYERING_TYPES,
        }
    }

    /// Inclusive amount range (IDR) sampled for this category.
    pub fn amount_range(&self) -> (u64, u64) {
        match self {
            Self::Legitimate => (1_000_000, 50_000_000),
            Self::SuspiciousStructuring => (45_000_000, 49_900_000),
            Self::SuspiciousLarge => (100_000_000, 5_000_000_000),
            Self::Layering => (500_000_000, 2_000_000_000),
        }
    }
}

const LEGITIMATE_TYPES: &[TransactionType] = &[
    TransactionType::SalaryPayment,
    TransactionType::SupplierPayment,
    TransactionType::TaxPayment,
    TransactionType::UtilityPayment,
    TransactionType::LoanPayment,
];
const STRUCTURING_TYPES: &[TransactionType] = &[
    TransactionType::CashDeposit,
    TransactionType::Transfer,
    TransactionType::Withdrawal,
];
const LARGE_TYPES: &[TransactionType] = &[
    TransactionType::LargeTransfer,
    TransactionType::ForeignExchange,
    TransactionType::Investment,
];
const LAYERING_TYPES: &[TransactionType] = &[
    TransactionType::InterCompanyTransfer,
    TransactionType::LoanAdvance,
    TransactionType::CapitalInjection,
];

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown pattern category '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Transaction types
// ---------------------------------------------------------------------------

/// Descriptive transaction label.
///
/// Labels outside the generator vocabulary are kept verbatim in `Other` so
/// externally produced tables can still be scored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionType {
    SalaryPayment,
    SupplierPayment,
    TaxPayment,
    UtilityPayment,
    LoanPayment,
    CashDeposit,
    Transfer,
    Withdrawal,
    LargeTransfer,
    ForeignExchange,
    Investment,
    InterCompanyTransfer,
    LoanAdvance,
    CapitalInjection,
    Other(String),
}

impl TransactionType {
    const KNOWN: [TransactionType; 14] = [
        Self::SalaryPayment,
        Self::SupplierPayment,
        Self::TaxPayment,
        Self::UtilityPayment,
        Self::LoanPayment,
        Self::CashDeposit,
        Self::Transfer,
        Self::Withdrawal,
        Self::LargeTransfer,
        Self::ForeignExchange,
        Self::Investment,
        Self::InterCompanyTransfer,
        Self::LoanAdvance,
        Self::CapitalInjection,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::SalaryPayment => "SALARY_PAYMENT",
            Self::SupplierPayment => "SUPPLIER_PAYMENT",
            Self::TaxPayment => "TAX_PAYMENT",
            Self::UtilityPayment => "UTILITY_PAYMENT",
            Self::LoanPayment => "LOAN_PAYMENT",
            Self::CashDeposit => "CASH_DEPOSIT",
            Self::Transfer => "TRANSFER",
            Self::Withdrawal => "WITHDRAWAL",
            Self::LargeTransfer => "LARGE_TRANSFER",
            Self::ForeignExchange => "FOREIGN_EXCHANGE",
            Self::Investment => "INVESTMENT",
            Self::InterCompanyTransfer => "INTER_COMPANY_TRANSFER",
            Self::LoanAdvance => "LOAN_ADVANCE",
            Self::CapitalInjection => "CAPITAL_INJECTION",
            Self::Other(label) => label,
        }
    }

    /// Bank statement description for this type.
    pub fn description(&self, sender: &str, receiver: &str) -> String {
        match self {
            Self::SalaryPayment => format!("Pembayaran gaji karyawan dari {sender}"),
            Self::SupplierPayment => format!("Pembayaran supplier untuk {receiver}"),
            Self::TaxPayment => "Pembayaran pajak perusahaan".to_string(),
            Self::CashDeposit => "Setoran tunai ke rekening perusahaan".to_string(),
            Self::LargeTransfer => format!("Transfer dana operasional ke {receiver}"),
            Self::ForeignExchange => "Transaksi valuta asing untuk ekspor".to_string(),
            Self::InterCompanyTransfer => "Transfer antar perusahaan grup".to_string(),
            Self::LoanAdvance => format!("Pinjaman/advance kepada {receiver}"),
            Self::Investment => "Investasi/penyertaan modal".to_string(),
            Self::CapitalInjection => "Penambahan modal perusahaan".to_string(),
            _ => format!("Transfer dari {sender} ke {receiver}"),
        }
    }
}

impl From<String> for TransactionType {
    fn from(label: String) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|t| t.as_str() == label)
            .unwrap_or(Self::Other(label))
    }
}

impl From<TransactionType> for String {
    fn from(t: TransactionType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Banking channel used for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    InternetBanking,
    MobileBanking,
    Atm,
    Branch,
    Rtgs,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Self::InternetBanking,
        Self::MobileBanking,
        Self::Atm,
        Self::Branch,
        Self::Rtgs,
    ];
}

// ---------------------------------------------------------------------------
// Transaction record
// ---------------------------------------------------------------------------

/// Everything about a transaction except the derived fields.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub transaction_id: String,
    pub transaction_date: NaiveDateTime,
    pub sender: Counterparty,
    pub receiver: Counterparty,
    pub amount_idr: u64,
    pub transaction_type: TransactionType,
    pub category: Category,
    pub bank_code: String,
    pub channel: Channel,
    pub cross_border: bool,
}

/// A single row of the transactions table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    #[serde(with = "datetime_format")]
    pub transaction_date: NaiveDateTime,
    pub sender_account: String,
    pub sender_name: String,
    pub sender_npwp: String,
    pub sender_risk: u8,
    pub receiver_account: String,
    pub receiver_name: String,
    pub receiver_npwp: String,
    pub receiver_risk: u8,
    pub amount_idr: u64,
    pub transaction_type: TransactionType,
    pub description: String,
    pub bank_code: String,
    pub channel: Channel,
    pub currency: String,
    pub pattern_type: Category,
    risk_score: u8,
    is_flagged: bool,
    reporting_threshold_flag: bool,
    pub cross_border: bool,
}

impl Transaction {
    /// Header of the transactions table, in field order.
    pub const CSV_COLUMNS: &'static [&'static str] = &[
        "transaction_id",
        "transaction_date",
        "sender_account",
        "sender_name",
        "sender_npwp",
        "sender_risk",
        "receiver_account",
        "receiver_name",
        "receiver_npwp",
        "receiver_risk",
        "amount_idr",
        "transaction_type",
        "description",
        "bank_code",
        "channel",
        "currency",
        "pattern_type",
        "risk_score",
        "is_flagged",
        "reporting_threshold_flag",
        "cross_border",
    ];

    /// Build a record from a draft, deriving score and flags from `weights`.
    pub fn new(draft: TransactionDraft, weights: &RiskWeights) -> Self {
        let description = draft
            .transaction_type
            .description(&draft.sender.name, &draft.receiver.name);

        let mut tx = Self {
            transaction_id: draft.transaction_id,
            transaction_date: draft.transaction_date,
            sender_account: draft.sender.account_number,
            sender_name: draft.sender.name,
            sender_npwp: draft.sender.npwp,
            sender_risk: draft.sender.risk_score,
            receiver_account: draft.receiver.account_number,
            receiver_name: draft.receiver.name,
            receiver_npwp: draft.receiver.npwp,
            receiver_risk: draft.receiver.risk_score,
            amount_idr: draft.amount_idr,
            transaction_type: draft.transaction_type,
            description,
            bank_code: draft.bank_code,
            channel: draft.channel,
            currency: "IDR".to_string(),
            pattern_type: draft.category,
            risk_score: 0,
            is_flagged: false,
            reporting_threshold_flag: false,
            cross_border: draft.cross_border,
        };
        tx.derive(weights);
        tx
    }

    /// Copy of this record with score and flags recomputed under `weights`.
    pub fn rescored(&self, weights: &RiskWeights) -> Self {
        let mut tx = self.clone();
        tx.derive(weights);
        tx
    }

    /// Score derived at construction, or as stored in a loaded table until
    /// the record is rescored.
    pub fn risk_score(&self) -> u8 {
        self.risk_score
    }

    pub fn is_flagged(&self) -> bool {
        self.is_flagged
    }

    pub fn reporting_threshold_flag(&self) -> bool {
        self.reporting_threshold_flag
    }

    /// Same record with an arbitrary stored score.
    #[cfg(test)]
    pub(crate) fn with_risk_score(mut self, score: u8) -> Self {
        self.risk_score = score;
        self
    }

    pub fn score_input(&self) -> ScoreInput<'_> {
        ScoreInput {
            amount: self.amount_idr,
            transaction_type: &self.transaction_type,
            category: self.pattern_type,
            sender_risk: self.sender_risk,
            receiver_risk: self.receiver_risk,
        }
    }

    pub fn involves(&self, npwp: &str) -> bool {
        self.sender_npwp == npwp || self.receiver_npwp == npwp
    }

    fn derive(&mut self, weights: &RiskWeights) {
        self.risk_score = weights.score(&self.score_input());
        self.is_flagged = weights.is_flagged(self.risk_score);
        self.reporting_threshold_flag = self.amount_idr >= weights.reporting_threshold;
    }
}

// ---------------------------------------------------------------------------
// Timestamp format
// ---------------------------------------------------------------------------

/// `YYYY-MM-DD HH:MM:SS` (de)serialization for naive timestamps.
pub mod datetime_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(raw.trim(), FORMAT).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => super::serialize(dt, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    NaiveDateTime::parse_from_str(raw.trim(), super::FORMAT)
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn party(name: &str, npwp: &str, risk: u8) -> Counterparty {
        Counterparty {
            account_number: format!("CORP_{name}_001"),
            name: name.to_string(),
            npwp: npwp.to_string(),
            risk_score: risk,
        }
    }

    fn draft(amount: u64, category: Category, tx_type: TransactionType) -> TransactionDraft {
        TransactionDraft {
            transaction_id: "TXN_000001".to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            sender: party("PT A", "11.111.111.1-111.111", 30),
            receiver: party("PT B", "22.222.222.2-222.222", 90),
            amount_idr: amount,
            transaction_type: tx_type,
            category,
            bank_code: "008".to_string(),
            channel: Channel::Rtgs,
            cross_border: false,
        }
    }

    #[test]
    fn test_type_label_round_trip() {
        for t in TransactionType::KNOWN {
            let label: String = t.clone().into();
            assert_eq!(TransactionType::from(label), t);
        }
        assert_eq!(
            TransactionType::from("CRYPTO_SWAP".to_string()),
            TransactionType::Other("CRYPTO_SWAP".to_string())
        );
    }

    #[test]
    fn test_category_vocab_ranges() {
        for c in Category::ALL {
            let (lo, hi) = c.amount_range();
            assert!(lo < hi, "{c} has an empty amount range");
            assert!(!c.types().is_empty());
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert!("smurfing".parse::<Category>().is_err());
    }

    #[test]
    fn test_new_derives_flags() {
        let weights = RiskWeights::default();
        let tx = Transaction::new(
            draft(48_000_000, Category::SuspiciousStructuring, TransactionType::CashDeposit),
            &weights,
        );
        // 25 + 25 + 40 + (30 + 90) / 4 = 120 -> clamped
        assert_eq!(tx.risk_score, 100);
        assert!(tx.is_flagged);
        assert!(!tx.reporting_threshold_flag);
        assert_eq!(tx.currency, "IDR");
        assert_eq!(tx.description, "Setoran tunai ke rekening perusahaan");
        assert_eq!(tx.sender_risk, 30);
    }

    #[test]
    fn test_legitimate_payment_not_flagged() {
        let weights = RiskWeights::default();
        let tx = Transaction::new(
            draft(50_000_000, Category::Legitimate, TransactionType::SalaryPayment),
            &weights,
        );
        // 0 + 0 + 0 + 30
        assert_eq!(tx.risk_score, 30);
        assert!(!tx.is_flagged);
        assert!(tx.reporting_threshold_flag);
        assert_eq!(tx.description, "Pembayaran gaji karyawan dari PT A");
    }

    #[test]
    fn test_rescore_is_stable() {
        let weights = RiskWeights::default();
        let tx = Transaction::new(
            draft(700_000_000, Category::Layering, TransactionType::LoanAdvance),
            &weights,
        );
        assert_eq!(tx.rescored(&weights), tx);
    }

    #[test]
    fn test_stored_score_changes_only_by_rescoring() {
        let weights = RiskWeights::default();
        let tx = Transaction::new(
            draft(48_000_000, Category::SuspiciousStructuring, TransactionType::CashDeposit),
            &weights,
        );
        let mut value = serde_json::to_value(&tx).unwrap();
        value["risk_score"] = 5.into();
        value["is_flagged"] = false.into();
        let stale: Transaction = serde_json::from_value(value).unwrap();

        assert_eq!(stale.risk_score(), 5);
        assert!(!stale.is_flagged());
        let fresh = stale.rescored(&weights);
        assert_eq!(fresh.risk_score(), 100);
        assert!(fresh.is_flagged());
        assert_eq!(fresh, tx);
    }

    #[test]
    fn test_timestamp_json_format() {
        let weights = RiskWeights::default();
        let tx = Transaction::new(
            draft(1_000_000, Category::Legitimate, TransactionType::TaxPayment),
            &weights,
        );
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"transaction_date\":\"2024-03-05 09:30:00\""));
        assert!(json.contains("\"pattern_type\":\"legitimate\""));
        assert!(json.contains("\"transaction_type\":\"TAX_PAYMENT\""));
        assert!(json.contains("\"channel\":\"RTGS\""));
        let parsed: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tx);
    }
}
