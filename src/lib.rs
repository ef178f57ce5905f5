//! jalak-hijau: synthetic palm-oil money-laundering case data
//!
//! Generates a company registry, individual account holders and a
//! twelve-month transaction network, scores every transaction, groups the
//! high-risk ones into suspicious clusters and writes flat tables for a
//! monitoring dashboard.
//!
//! # Pattern Categories
//!
//! - **legitimate**: routine payments between plantations and individuals
//! - **suspicious_structuring**: amounts just under the 50M IDR reporting threshold
//! - **suspicious_large**: large transfers from plantations into shell companies
//! - **layering**: funds moved through chains of intermediary entities

pub mod case;
pub mod cluster;
pub mod config;
pub mod generator;
pub mod ingest;
pub mod output;
pub mod party;
pub mod registry;
pub mod report;
pub mod scoring;
pub mod summary;
pub mod transaction;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use eyre::{Result, WrapErr};

use crate::cluster::{detect_clusters, Cluster};
use crate::config::Config;
use crate::generator::TransactionGenerator;
use crate::output::Tables;
use crate::party::{dummy_companies, Company, Individual};
use crate::registry::{CompanyProfile, BUILTIN_PALM_NAMES};
use crate::summary::Summary;
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// Registry source
// ---------------------------------------------------------------------------

/// Where the company pool of a batch came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrySource {
    File(PathBuf),
    /// Built-in demo companies, used when no registry table exists
    Builtin,
}

/// Companies from the registry table at `path`, or the built-in demo set
/// when the file does not exist or has no rows. Any other load failure is
/// an error.
pub fn load_registry_or_builtin<R: rand::Rng + ?Sized>(
    path: &Path,
    rng: &mut R,
) -> Result<(Vec<Company>, RegistrySource)> {
    match ingest::load_companies(path) {
        Ok(companies) if !companies.is_empty() => {
            tracing::info!(path = %path.display(), companies = companies.len(), "loaded registry");
            Ok((companies, RegistrySource::File(path.to_path_buf())))
        }
        Ok(_) => {
            tracing::warn!(path = %path.display(), "registry is empty, using built-in companies");
            Ok((dummy_companies(rng), RegistrySource::Builtin))
        }
        Err(e) if e.is_not_found() => {
            tracing::warn!(path = %path.display(), "registry not found, using built-in companies");
            Ok((dummy_companies(rng), RegistrySource::Builtin))
        }
        Err(e) => Err(e).wrap_err("Failed to load company registry"),
    }
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

/// A generated batch and everything derived from it.
#[derive(Debug, Clone)]
pub struct Batch {
    pub anchor: NaiveDateTime,
    pub registry_source: RegistrySource,
    pub companies: Vec<Company>,
    pub individuals: Vec<Individual>,
    /// Network transactions followed by the featured-case series
    pub transactions: Vec<Transaction>,
    /// The featured-case series on its own
    pub case_study: Vec<Transaction>,
    pub clusters: Vec<Cluster>,
    pub summary: Summary,
}

impl Batch {
    pub fn tables(&self) -> Tables<'_> {
        Tables {
            transactions: &self.transactions,
            clusters: &self.clusters,
            summary: &self.summary,
            individuals: Some(&self.individuals),
            case_study: (!self.case_study.is_empty()).then_some(self.case_study.as_slice()),
        }
    }
}

/// Generate a full batch.
///
/// `registry` defaults to the registry table under the output directory.
pub fn generate_batch(config: &Config, registry: Option<&Path>) -> Result<Batch> {
    config.validate()?;

    let mut gen = TransactionGenerator::new(config.generation.clone());
    let anchor = gen.anchor();
    let registry_path = registry
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.output.registry_path());
    let (mut companies, registry_source) = load_registry_or_builtin(&registry_path, gen.rng())?;

    let case = &config.featured_case;
    if case.enabled {
        for company in [case.front_company(), case.shell_company()] {
            if !companies
                .iter()
                .any(|c| c.npwp_perusahaan == company.npwp_perusahaan)
            {
                companies.push(company);
            }
        }
    }

    let individuals = gen.individuals();
    let mut transactions = gen
        .transactions(&companies, &individuals, &config.scoring)
        .wrap_err("Failed to generate transaction network")?;

    let case_study = case
        .transactions(anchor, &config.scoring)
        .wrap_err("Failed to build featured case series")?;
    transactions.extend(case_study.iter().cloned());

    let clusters = detect_clusters(&transactions, &config.clusters);
    let summary = Summary::compute(&transactions, &clusters, &config.scoring);

    tracing::info!(
        transactions = summary.total_transactions,
        high_risk = summary.high_risk_transactions,
        clusters = summary.suspicious_clusters,
        case_study = case_study.len(),
        "batch generated"
    );

    Ok(Batch {
        anchor,
        registry_source,
        companies,
        individuals,
        transactions,
        case_study,
        clusters,
        summary,
    })
}

/// Generate registry profiles from `names` (or the built-in plantation
/// names when `None`).
pub fn generate_registry(config: &Config, names: Option<&Path>) -> Result<Vec<CompanyProfile>> {
    config.generation.validate()?;

    let palm_names: Vec<String> = match names {
        Some(path) => ingest::load_palm_names(path).wrap_err("Failed to load plantation names")?,
        None => BUILTIN_PALM_NAMES.iter().map(|n| n.to_string()).collect(),
    };
    if palm_names.len() > registry::MAX_PALM_COMPANIES {
        tracing::warn!(
            names = palm_names.len(),
            max = registry::MAX_PALM_COMPANIES,
            "too many plantation names, truncating"
        );
    }

    let mut gen = TransactionGenerator::new(config.generation.clone());
    let profiles = gen.registry(&palm_names);
    tracing::info!(
        companies = profiles.len(),
        suspicious = profiles.iter().filter(|p| p.is_suspicious).count(),
        "registry generated"
    );
    Ok(profiles)
}

// ---------------------------------------------------------------------------
// Analyze
// ---------------------------------------------------------------------------

/// An existing batch re-scored under the current configuration.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub transactions: Vec<Transaction>,
    pub clusters: Vec<Cluster>,
    pub summary: Summary,
    /// Records whose score differs from the one they were loaded with
    pub rescored: usize,
}

impl Analysis {
    pub fn tables(&self) -> Tables<'_> {
        Tables {
            transactions: &self.transactions,
            clusters: &self.clusters,
            summary: &self.summary,
            individuals: None,
            case_study: None,
        }
    }
}

/// Re-score `transactions` with the configured weights, then cluster and
/// summarize them.
pub fn analyze(transactions: &[Transaction], config: &Config) -> Analysis {
    let rescored: Vec<Transaction> = transactions
        .iter()
        .map(|tx| tx.rescored(&config.scoring))
        .collect();
    let changed = transactions
        .iter()
        .zip(&rescored)
        .filter(|(before, after)| before.risk_score() != after.risk_score())
        .count();

    let clusters = detect_clusters(&rescored, &config.clusters);
    let summary = Summary::compute(&rescored, &clusters, &config.scoring);

    tracing::info!(
        transactions = rescored.len(),
        rescored = changed,
        clusters = clusters.len(),
        "analysis finished"
    );

    Analysis {
        transactions: rescored,
        clusters,
        summary,
        rescored: changed,
    }
}
