//! Parties that appear on either side of a transaction.
//!
//! Companies come from the registry (or the built-in demo set), individuals
//! are generated per batch. Both resolve to a [`Counterparty`], which is the
//! only party view the transaction layer needs: account, display name, tax
//! ID and base risk score.

use chrono::{Datelike, Duration, NaiveDateTime};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Name pools
// ---------------------------------------------------------------------------

pub(crate) const FIRST_NAMES: &[&str] = &[
    "Ahmad", "Budi", "Sari", "Dewi", "Eko", "Fitri", "Gina", "Hadi", "Indra", "Joko", "Kartika",
    "Linda", "Maya", "Nana", "Oki", "Putra", "Ratna", "Sinta", "Tono", "Umar", "Vina", "Wati",
    "Yudi", "Zaki", "Andi", "Bayu", "Citra", "Dian", "Endang", "Farid",
];

pub(crate) const LAST_NAMES: &[&str] = &[
    "Wijaya", "Kusuma", "Pratama", "Sari", "Putra", "Putri", "Santoso", "Wibowo", "Setiawan",
    "Hartono", "Gunawan", "Firmansyah", "Hidayat", "Rachmadi", "Wahyudi", "Permana", "Nugroho",
    "Budiman", "Hakim", "Rahman", "Kurniawan", "Maulana", "Syahputra", "Wardana", "Darmawan",
];

/// Kabupaten/kota prefixes used for the first four NIK digits.
const NIK_AREA_CODES: &[&str] = &["3201", "3273", "3174", "6471", "1871", "3578", "3471", "3215"];

/// Major Indonesian bank codes.
pub(crate) const BANK_CODES: &[&str] = &["008", "009", "011", "013", "014", "016", "019", "022"];

const DEMO_PALM_COMPANIES: &[&str] = &[
    "PT BERKAH SAWIT NUSANTARA",
    "PT HIJAU SEJAHTERA ABADI",
    "PT CAHAYA PALM OIL",
    "PT DUTA KELAPA SAWIT",
    "PT EMAS HIJAU PLANTATION",
    "PT FAJAR SAWIT MANDIRI",
];

const DEMO_SHELL_COMPANIES: &[&str] = &[
    "PT KARYA UTAMA CONSULTING",
    "PT PRIMA JAYA TRADING",
    "PT OMEGA DIGITAL SOLUTIONS",
    "PT NUSA BERKAH MANDIRI",
    "PT GEMILANG MULTI FINANCE",
    "PT CAHAYA INVESTAMA",
];

// ---------------------------------------------------------------------------
// Party types
// ---------------------------------------------------------------------------

/// The transaction-facing view of a party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterparty {
    pub account_number: String,
    pub name: String,
    /// NPWP, the identity used for grouping.
    pub npwp: String,
    /// Base risk score, 0-100.
    pub risk_score: u8,
}

/// A registered company as used by the transaction generator.
///
/// Suspicious companies form the shell pool; the rest are treated as
/// plantation operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub company_id: String,
    pub nama_perseroan: String,
    pub npwp_perusahaan: String,
    pub is_suspicious: bool,
    pub risk_score: u8,
}

impl Company {
    pub fn account_number(&self) -> String {
        format!("CORP_{}_001", self.company_id)
    }

    pub fn counterparty(&self) -> Counterparty {
        Counterparty {
            account_number: self.account_number(),
            name: self.nama_perseroan.clone(),
            npwp: self.npwp_perusahaan.clone(),
            risk_score: self.risk_score,
        }
    }
}

/// An individual account holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    pub person_id: String,
    pub full_name: String,
    pub nik: String,
    pub npwp: String,
    pub account_number: String,
    pub is_nominee: bool,
}

impl Individual {
    pub const CSV_COLUMNS: &'static [&'static str] = &[
        "person_id",
        "full_name",
        "nik",
        "npwp",
        "account_number",
        "is_nominee",
    ];

    pub fn counterparty(&self, risk_score: u8) -> Counterparty {
        Counterparty {
            account_number: self.account_number.clone(),
            name: self.full_name.clone(),
            npwp: self.npwp.clone(),
            risk_score,
        }
    }
}

// ---------------------------------------------------------------------------
// Identity generators
// ---------------------------------------------------------------------------

/// Random NPWP in the `XX.XXX.XXX.X-XXX.XXX` layout.
pub fn generate_npwp<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}.{}.{}.{}-{}.{}",
        rng.gen_range(10..=99),
        rng.gen_range(100..=999),
        rng.gen_range(100..=999),
        rng.gen_range(1..=9),
        rng.gen_range(100..=999),
        rng.gen_range(100..=999),
    )
}

/// Random 16-digit NIK: area code, DDMMYY birth date, sequence number.
///
/// The holder is 25 to 70 years old relative to `anchor`.
pub fn generate_nik<R: Rng + ?Sized>(rng: &mut R, anchor: NaiveDateTime) -> String {
    let area = NIK_AREA_CODES.choose(rng).copied().unwrap_or("3201");
    let age_days = rng.gen_range(25 * 365..=70 * 365);
    let birth = (anchor - Duration::days(age_days)).date();
    format!(
        "{}{:02}{:02}{:02}{:04}",
        area,
        birth.day(),
        birth.month(),
        birth.year().rem_euclid(100),
        rng.gen_range(1..=9999)
    )
}

/// Bank code followed by a ten-digit account number.
pub fn generate_account_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bank = BANK_CODES.choose(rng).copied().unwrap_or("008");
    format!("{}{}", bank, rng.gen_range(1_000_000_000u64..=9_999_999_999))
}

pub fn random_person_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Ahmad");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Wijaya");
    format!("{first} {last}")
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// Built-in demo registry used when no registry table is available.
pub fn dummy_companies<R: Rng + ?Sized>(rng: &mut R) -> Vec<Company> {
    let palm = DEMO_PALM_COMPANIES.iter().map(|name| (name, false));
    let shell = DEMO_SHELL_COMPANIES.iter().map(|name| (name, true));

    palm.chain(shell)
        .enumerate()
        .map(|(i, (name, is_suspicious))| Company {
            company_id: format!("{}_{:03}", if is_suspicious { "SHELL" } else { "PALM" }, i + 1),
            nama_perseroan: name.to_string(),
            npwp_perusahaan: generate_npwp(rng),
            is_suspicious,
            risk_score: if is_suspicious {
                rng.gen_range(70..=95)
            } else {
                rng.gen_range(20..=50)
            },
        })
        .collect()
}

/// Generate `count` individual account holders.
///
/// Each one is a nominee with probability `nominee_rate`.
pub fn generate_individuals<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    nominee_rate: f64,
    anchor: NaiveDateTime,
) -> Vec<Individual> {
    let nominee_rate = nominee_rate.clamp(0.0, 1.0);
    (0..count)
        .map(|i| Individual {
            person_id: format!("IND_{:04}", i + 1),
            full_name: random_person_name(rng),
            nik: generate_nik(rng, anchor),
            npwp: generate_npwp(rng),
            account_number: generate_account_number(rng),
            is_nominee: rng.gen_bool(nominee_rate),
        })
        .collect()
}
