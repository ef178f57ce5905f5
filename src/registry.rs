//! Synthetic company registry ("PT data").
//!
//! Produces full deed-level profiles for plantation companies and pure shell
//! companies. Suspicious entities get thin paid-in capital, young deeds,
//! crowded shareholder lists and unrelated KBLI codes.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::party::{generate_nik, generate_npwp, random_person_name};

/// KBLI codes for plantation and adjacent activity.
const PALM_KBLI: &[&str] = &[
    "01134", // Budidaya kelapa sawit
    "01135", // Budidaya kelapa
    "10411", // Industri minyak kelapa sawit kasar
    "10412", // Industri minyak kelapa sawit olahan
    "46691", // Perdagangan besar minyak nabati
    "02200", // Penebangan kayu
    "08910", // Pertambangan mineral lainnya
    "68100", // Real estat dengan hak milik sendiri
    "70200", // Konsultasi manajemen
    "82990", // Jasa penunjang usaha lainnya
];

/// KBLI codes typical of front companies.
const UNRELATED_KBLI: &[&str] = &[
    "47911", // Perdagangan eceran melalui internet
    "58190", // Penerbitan lainnya
    "62010", // Pemrograman komputer
    "64199", // Jasa keuangan lainnya
    "77100", // Sewa kendaraan bermotor
];

const SHELL_PREFIXES: &[&str] = &["CV", "PT", "UD"];

const SHELL_PATTERNS: &[&str] = &[
    "BERKAH NUSANTARA",
    "CAHAYA MANDIRI",
    "DUTA SEJAHTERA",
    "EMAS KENCANA",
    "FAJAR CEMERLANG",
    "GEMILANG ABADI",
    "HARAPAN BARU",
    "INDAH PERMAI",
    "JAYA MAKMUR",
    "KARYA UTAMA",
    "LESTARI MANDIRI",
    "MAJU BERSAMA",
    "NUSA INDAH",
    "OMEGA PRIMA",
    "PRIMA SEJAHTERA",
];

/// Plantation names used when no name list is supplied.
pub const BUILTIN_PALM_NAMES: &[&str] = &[
    "PT SAWIT NUSANTARA",
    "PT BERKAH SAWIT NUSANTARA",
    "PT HIJAU SEJAHTERA ABADI",
    "PT CAHAYA PALM OIL",
    "PT DUTA KELAPA SAWIT",
    "PT EMAS HIJAU PLANTATION",
    "PT FAJAR SAWIT MANDIRI",
    "PT RIAU AGRO LESTARI",
    "PT KALIMANTAN SAWIT PERKASA",
    "PT SUMATERA INTI PLANTATION",
    "PT BORNEO HIJAU MAKMUR",
    "PT JAMBI KELAPA SAWIT",
];

const STREETS: &[&str] = &[
    "Jalan Sudirman",
    "Jalan Sawit Raya",
    "Jalan Gatot Subroto",
    "Jalan Diponegoro",
    "Jalan Ahmad Yani",
    "Jalan Merdeka",
    "Jalan Hayam Wuruk",
];

const CITIES: &[(&str, &str)] = &[
    ("Pekanbaru", "Riau"),
    ("Jakarta Pusat", "DKI Jakarta"),
    ("Palangka Raya", "Kalimantan Tengah"),
    ("Pontianak", "Kalimantan Barat"),
    ("Jambi", "Jambi"),
    ("Medan", "Sumatera Utara"),
    ("Samarinda", "Kalimantan Timur"),
];

/// At most this many plantation names are taken from the input list.
pub const MAX_PALM_COMPANIES: usize = 80;

/// Share of plantation companies made suspicious.
const SUSPICIOUS_PALM_RATE: f64 = 0.2;

// ---------------------------------------------------------------------------
// Profile types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shareholder {
    pub nama: String,
    pub nik: String,
    pub npwp: String,
    /// Ownership percentage, two decimals
    pub persentase: f64,
}

/// A full registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_id: String,
    pub nama_perseroan: String,
    pub kbli: String,
    pub alamat_lengkap: String,
    pub kode_pos: String,
    pub maksud_tujuan: String,
    /// Authorised capital
    pub modal_dasar: u64,
    /// Placed capital
    pub modal_ditempatkan: u64,
    /// Paid-in capital
    pub modal_disetor: u64,
    pub nilai_nominal_saham: u64,
    pub jumlah_saham: u64,
    pub pemegang_saham: Vec<Shareholder>,
    pub direktur_utama: String,
    pub direktur_nik: String,
    pub direktur_npwp: String,
    pub komisaris_utama: String,
    pub komisaris_nik: String,
    pub komisaris_npwp: String,
    pub jangka_waktu: String,
    pub tanggal_akta: NaiveDate,
    pub notaris: String,
    pub npwp_perusahaan: String,
    pub status_perusahaan: String,
    pub is_suspicious: bool,
    pub risk_score: u8,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Capital, ownership and age ranges for one kind of company.
struct Profile {
    authorised: (u64, u64),
    placed_share: (f64, f64),
    paid_in_share: (f64, f64),
    nominal: &'static [u64],
    shareholders: (usize, usize),
    pct_bounds: (f64, f64),
    age_days: (i64, i64),
    risk: (u8, u8),
}

const LEGITIMATE_PALM: Profile = Profile {
    authorised: (10_000_000_000, 100_000_000_000),
    placed_share: (0.25, 0.8),
    paid_in_share: (0.7, 1.0),
    nominal: &[1_000_000, 5_000_000, 10_000_000],
    shareholders: (1, 4),
    pct_bounds: (10.0, 80.0),
    age_days: (365 * 3, 365 * 20),
    risk: (10, 40),
};

const SUSPICIOUS_PALM: Profile = Profile {
    authorised: (1_000_000_000, 5_000_000_000),
    placed_share: (0.1, 0.3),
    paid_in_share: (0.1, 0.5),
    nominal: &[1_000_000, 5_000_000, 10_000_000],
    shareholders: (2, 6),
    pct_bounds: (10.0, 80.0),
    age_days: (30, 365 * 2),
    risk: (70, 95),
};

const SHELL: Profile = Profile {
    authorised: (500_000_000, 2_000_000_000),
    placed_share: (0.25, 0.5),
    paid_in_share: (0.1, 0.3),
    nominal: &[1_000_000],
    shareholders: (3, 8),
    pct_bounds: (5.0, 30.0),
    age_days: (7, 180),
    risk: (80, 98),
};

/// Generate the registry: up to [`MAX_PALM_COMPANIES`] plantation companies
/// from `palm_names` followed by `shell_count` shell companies.
pub fn generate_registry<R: Rng + ?Sized>(
    rng: &mut R,
    palm_names: &[String],
    shell_count: usize,
    anchor: NaiveDateTime,
) -> Vec<CompanyProfile> {
    let mut companies = Vec::with_capacity(palm_names.len().min(MAX_PALM_COMPANIES) + shell_count);

    for (i, name) in palm_names.iter().take(MAX_PALM_COMPANIES).enumerate() {
        let is_suspicious = rng.gen_bool(SUSPICIOUS_PALM_RATE);
        let profile = if is_suspicious { &SUSPICIOUS_PALM } else { &LEGITIMATE_PALM };
        let name = if name.starts_with("PT") {
            name.clone()
        } else {
            format!("PT {name}")
        };
        let term = if is_suspicious {
            format!("{} tahun", rng.gen_range(10..=25))
        } else {
            "Tidak terbatas".to_string()
        };
        let kbli = pick(rng, &PALM_KBLI[..6]);

        companies.push(build_profile(
            rng,
            profile,
            ProfileSeed {
                company_id: format!("PT_{:04}", i + 1),
                name,
                kbli,
                purpose: "Usaha perkebunan kelapa sawit dan pengolahan hasil",
                term,
                is_suspicious,
            },
            anchor,
        ));
    }

    for i in 0..shell_count {
        let name = format!("{} {}", pick(rng, SHELL_PREFIXES), pick(rng, SHELL_PATTERNS));
        let term = format!("{} tahun", rng.gen_range(5..=15));
        let kbli = pick(rng, &kbli_pool()[6..]);

        companies.push(build_profile(
            rng,
            &SHELL,
            ProfileSeed {
                company_id: format!("SH_{:04}", i + 1),
                name,
                kbli,
                purpose: "Perdagangan umum dan jasa konsultan",
                term,
                is_suspicious: true,
            },
            anchor,
        ));
    }

    tracing::debug!(
        companies = companies.len(),
        suspicious = companies.iter().filter(|c| c.is_suspicious).count(),
        "registry generated"
    );

    companies
}

/// All KBLI codes; the tail past index 6 is drawn for shells.
fn kbli_pool() -> Vec<&'static str> {
    PALM_KBLI.iter().chain(UNRELATED_KBLI).copied().collect()
}

struct ProfileSeed {
    company_id: String,
    name: String,
    kbli: String,
    purpose: &'static str,
    term: String,
    is_suspicious: bool,
}

fn build_profile<R: Rng + ?Sized>(
    rng: &mut R,
    profile: &Profile,
    seed: ProfileSeed,
    anchor: NaiveDateTime,
) -> CompanyProfile {
    let modal_dasar = rng.gen_range(profile.authorised.0..=profile.authorised.1);
    let modal_ditempatkan = share_of(rng, modal_dasar, profile.placed_share);
    let modal_disetor = share_of(rng, modal_ditempatkan, profile.paid_in_share);
    let nilai_nominal_saham = profile.nominal.choose(rng).copied().unwrap_or(1_000_000);

    let holders = rng.gen_range(profile.shareholders.0..=profile.shareholders.1);
    let percentages = split_ownership(rng, holders, profile.pct_bounds);
    let pemegang_saham = percentages
        .into_iter()
        .map(|persentase| Shareholder {
            nama: random_person_name(rng),
            nik: generate_nik(rng, anchor),
            npwp: generate_npwp(rng),
            persentase,
        })
        .collect();

    let age = rng.gen_range(profile.age_days.0..=profile.age_days.1);
    let (street, (city, province)) = (
        pick(rng, STREETS),
        CITIES.choose(rng).copied().unwrap_or(("Pekanbaru", "Riau")),
    );

    CompanyProfile {
        company_id: seed.company_id,
        nama_perseroan: seed.name,
        kbli: seed.kbli,
        alamat_lengkap: format!("{street} No. {}, {city}, {province}", rng.gen_range(1..=200)),
        kode_pos: format!("{}", rng.gen_range(10_000..=99_999)),
        maksud_tujuan: seed.purpose.to_string(),
        modal_dasar,
        modal_ditempatkan,
        modal_disetor,
        nilai_nominal_saham,
        jumlah_saham: modal_ditempatkan / nilai_nominal_saham,
        pemegang_saham,
        direktur_utama: random_person_name(rng),
        direktur_nik: generate_nik(rng, anchor),
        direktur_npwp: generate_npwp(rng),
        komisaris_utama: random_person_name(rng),
        komisaris_nik: generate_nik(rng, anchor),
        komisaris_npwp: generate_npwp(rng),
        jangka_waktu: seed.term,
        tanggal_akta: (anchor - Duration::days(age)).date(),
        notaris: format!("{}, S.H., M.Kn.", random_person_name(rng)),
        npwp_perusahaan: generate_npwp(rng),
        status_perusahaan: "Aktif".to_string(),
        is_suspicious: seed.is_suspicious,
        risk_score: rng.gen_range(profile.risk.0..=profile.risk.1),
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, pool: &[&str]) -> String {
    pool.choose(rng).copied().unwrap_or_default().to_string()
}

fn share_of<R: Rng + ?Sized>(rng: &mut R, total: u64, (lo, hi): (f64, f64)) -> u64 {
    let low = (total as f64 * lo) as u64;
    let high = ((total as f64 * hi) as u64).max(low);
    rng.gen_range(low..=high)
}

/// Split 100 % across `holders` shareholders.
///
/// Raw weights are drawn from `bounds` and normalised; values are rounded to
/// two decimals and the last holder absorbs the rounding remainder, so the
/// result always sums to exactly 100.00.
fn split_ownership<R: Rng + ?Sized>(rng: &mut R, holders: usize, bounds: (f64, f64)) -> Vec<f64> {
    if holders == 0 {
        return Vec::new();
    }
    let weights: Vec<f64> = (0..holders).map(|_| rng.gen_range(bounds.0..=bounds.1)).collect();
    let total: f64 = weights.iter().sum();

    let mut cents: Vec<i64> = weights
        .iter()
        .map(|w| ((w / total) * 10_000.0).floor() as i64)
        .collect();
    let assigned: i64 = cents[..holders - 1].iter().sum();
    cents[holders - 1] = 10_000 - assigned;

    cents.into_iter().map(|c| c as f64 / 100.0).collect()
}
