//! Loading registry and transaction tables from disk.
//!
//! A missing file is reported as [`LoadError::NotFound`] so the caller can
//! decide whether a fallback makes sense. Rows that do not parse are
//! rejected with the path and their 1-based data row.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::cluster::Cluster;
use crate::party::Company;
use crate::transaction::Transaction;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: row {row}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        row: usize,
        reason: String,
    },
}

impl LoadError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

fn open(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Deserialize every data row of a headed CSV file, running `check` on each.
fn read_csv<T, F>(path: &Path, check: F) -> Result<Vec<T>, LoadError>
where
    T: DeserializeOwned,
    F: Fn(&T) -> Result<(), String>,
{
    let mut reader = csv::Reader::from_reader(open(path)?);
    let mut rows = Vec::new();

    for (i, record) in reader.deserialize::<T>().enumerate() {
        let row = i + 1;
        let value = record.map_err(|e| csv_error(path, row, e))?;
        check(&value).map_err(|reason| LoadError::Malformed {
            path: path.to_path_buf(),
            row,
            reason,
        })?;
        rows.push(value);
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "loaded table");
    Ok(rows)
}

fn csv_error(path: &Path, row: usize, e: csv::Error) -> LoadError {
    if !e.is_io_error() {
        return LoadError::Malformed {
            path: path.to_path_buf(),
            row,
            reason: e.to_string(),
        };
    }
    match e.into_kind() {
        csv::ErrorKind::Io(source) => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
        kind => LoadError::Malformed {
            path: path.to_path_buf(),
            row,
            reason: format!("{kind:?}"),
        },
    }
}

fn check_risk(field: &str, value: u8) -> Result<(), String> {
    if value > 100 {
        Err(format!("{field} {value} exceeds 100"))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registry columns the transaction generator needs. Any other column in
/// the file is ignored.
#[derive(Debug, Deserialize)]
struct CompanyRecord {
    company_id: String,
    nama_perseroan: String,
    npwp_perusahaan: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    is_suspicious: bool,
    #[serde(default = "default_company_risk")]
    risk_score: u8,
}

fn default_company_risk() -> u8 {
    10
}

/// Accepts `true`/`false` in any case as well as `1`/`0`.
fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid boolean '{other}'"))),
    }
}

/// Companies from a registry CSV (`company_id`, `nama_perseroan`,
/// `npwp_perusahaan`, `is_suspicious`, `risk_score`).
pub fn load_companies(path: &Path) -> Result<Vec<Company>, LoadError> {
    let records: Vec<CompanyRecord> =
        read_csv(path, |r: &CompanyRecord| check_risk("risk_score", r.risk_score))?;
    Ok(records
        .into_iter()
        .map(|r| Company {
            company_id: r.company_id,
            nama_perseroan: r.nama_perseroan,
            npwp_perusahaan: r.npwp_perusahaan,
            is_suspicious: r.is_suspicious,
            risk_score: r.risk_score,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct NameRecord {
    company: String,
}

/// Plantation company names from a CSV with a `company` column. Blank
/// names are skipped.
pub fn load_palm_names(path: &Path) -> Result<Vec<String>, LoadError> {
    let records: Vec<NameRecord> = read_csv(path, |_: &NameRecord| Ok(()))?;
    Ok(records
        .into_iter()
        .map(|r| r.company.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

// ---------------------------------------------------------------------------
// Transactions and clusters
// ---------------------------------------------------------------------------

/// Transactions table as written by `generate`.
pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>, LoadError> {
    read_csv(path, |tx: &Transaction| {
        check_risk("sender_risk", tx.sender_risk)?;
        check_risk("receiver_risk", tx.receiver_risk)?;
        check_risk("risk_score", tx.risk_score())
    })
}

/// Clusters from the nested JSON export.
pub fn load_clusters(path: &Path) -> Result<Vec<Cluster>, LoadError> {
    let mut content = String::new();
    open(path)?
        .read_to_string(&mut content)
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|e| LoadError::Malformed {
        path: path.to_path_buf(),
        row: e.line(),
        reason: e.to_string(),
    })
}
