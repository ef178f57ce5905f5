//! Seeded synthetic transaction generator.
//!
//! The generator owns the only RNG in the crate. Every other stage (scoring,
//! clustering, summaries) is a pure function of the records it produces.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use eyre::{ensure, eyre, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::party::{generate_individuals, Company, Counterparty, Individual};
use crate::registry::{generate_registry, CompanyProfile};
use crate::scoring::RiskWeights;
use crate::transaction::{datetime_format, Category, Channel, Transaction, TransactionDraft};

/// Bank codes stamped on generated transactions.
const TRANSFER_BANK_CODES: &[&str] = &["008", "009", "011", "013", "014"];

/// `[generation]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Number of network transactions, excluding the featured case
    pub transactions: usize,
    pub individuals: usize,
    /// Probability that an individual is a nominee
    pub nominee_rate: f64,
    /// RNG seed; a fresh entropy seed is drawn when absent
    pub seed: Option<u64>,
    /// End of the twelve-month window; defaults to the current local time
    #[serde(with = "datetime_format::option", skip_serializing_if = "Option::is_none")]
    pub anchor: Option<NaiveDateTime>,
    /// Months large and layering transactions gravitate to
    pub harvest_months: Vec<u32>,
    /// Share of large and layering transactions placed in harvest months
    pub harvest_rate: f64,
    /// Share of large and layering transactions that cross a border
    pub cross_border_rate: f64,
    /// Base risk for regular individuals
    pub individual_risk: u8,
    /// Base risk for nominees
    pub nominee_risk: u8,
    /// Shell companies added by the `registry` command
    pub shell_companies: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            transactions: 8_000,
            individuals: 200,
            nominee_rate: 0.2,
            seed: None,
            anchor: None,
            harvest_months: vec![3, 4, 9, 10],
            harvest_rate: 0.6,
            cross_border_rate: 0.1,
            individual_risk: 10,
            nominee_risk: 10,
            shell_companies: 30,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, rate) in [
            ("nominee_rate", self.nominee_rate),
            ("harvest_rate", self.harvest_rate),
            ("cross_border_rate", self.cross_border_rate),
        ] {
            ensure!(
                (0.0..=1.0).contains(&rate),
                "generation.{name} must be within [0, 1], got {rate}"
            );
        }
        ensure!(
            !self.harvest_months.is_empty(),
            "generation.harvest_months must not be empty"
        );
        if let Some(month) = self.harvest_months.iter().find(|m| !(1..=12).contains(*m)) {
            eyre::bail!("generation.harvest_months contains invalid month {month}");
        }
        ensure!(
            self.individual_risk <= 100 && self.nominee_risk <= 100,
            "generation individual and nominee risk must be at most 100"
        );
        Ok(())
    }

    /// The configured anchor, or now, truncated to whole seconds.
    pub fn resolve_anchor(&self) -> NaiveDateTime {
        let anchor = self
            .anchor
            .unwrap_or_else(|| chrono::Local::now().naive_local());
        anchor.with_nanosecond(0).unwrap_or(anchor)
    }
}

// ---------------------------------------------------------------------------
// Party pools
// ---------------------------------------------------------------------------

/// Counterparties split by the role they play in the network.
struct Pools {
    palm: Vec<Counterparty>,
    shell: Vec<Counterparty>,
    nominees: Vec<Counterparty>,
    regular: Vec<Counterparty>,
}

impl Pools {
    fn new(companies: &[Company], individuals: &[Individual], config: &GenerationConfig) -> Result<Self> {
        let (shell, palm): (Vec<&Company>, Vec<&Company>) =
            companies.iter().partition(|c| c.is_suspicious);
        let (nominees, regular): (Vec<&Individual>, Vec<&Individual>) =
            individuals.iter().partition(|p| p.is_nominee);

        ensure!(!palm.is_empty(), "no palm companies available as senders");
        ensure!(!shell.is_empty(), "no shell companies available as receivers");

        Ok(Self {
            palm: palm.iter().map(|c| c.counterparty()).collect(),
            shell: shell.iter().map(|c| c.counterparty()).collect(),
            nominees: nominees
                .iter()
                .map(|p| p.counterparty(config.nominee_risk))
                .collect(),
            regular: regular
                .iter()
                .map(|p| p.counterparty(config.individual_risk))
                .collect(),
        })
    }
}

/// Uniform pick over the concatenation of two pools.
fn pick_from<'a, R: Rng + ?Sized>(
    rng: &mut R,
    first: &'a [Counterparty],
    second: &'a [Counterparty],
) -> Option<&'a Counterparty> {
    let total = first.len() + second.len();
    if total == 0 {
        return None;
    }
    let idx = rng.gen_range(0..total);
    first.get(idx).or_else(|| second.get(idx - first.len()))
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct TransactionGenerator {
    config: GenerationConfig,
    rng: StdRng,
    anchor: NaiveDateTime,
}

impl TransactionGenerator {
    pub fn new(config: GenerationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let anchor = config.resolve_anchor();
        Self { config, rng, anchor }
    }

    pub fn anchor(&self) -> NaiveDateTime {
        self.anchor
    }

    /// Mutable access to the RNG for stages that share the seed stream.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn individuals(&mut self) -> Vec<Individual> {
        generate_individuals(
            &mut self.rng,
            self.config.individuals,
            self.config.nominee_rate,
            self.anchor,
        )
    }

    pub fn registry(&mut self, palm_names: &[String]) -> Vec<CompanyProfile> {
        generate_registry(
            &mut self.rng,
            palm_names,
            self.config.shell_companies,
            self.anchor,
        )
    }

    /// Generate the transaction network between `companies` and
    /// `individuals`, scoring each record with `weights`.
    pub fn transactions(
        &mut self,
        companies: &[Company],
        individuals: &[Individual],
        weights: &RiskWeights,
    ) -> Result<Vec<Transaction>> {
        self.config.validate()?;
        let pools = Pools::new(companies, individuals, &self.config)?;
        let mut transactions = Vec::with_capacity(self.config.transactions);

        for i in 0..self.config.transactions {
            let category = self.sample_category();
            let (sender, receiver) = self.sample_parties(&pools, category)?;
            let draft = self.draft(i + 1, category, sender, receiver)?;
            transactions.push(Transaction::new(draft, weights));
        }

        tracing::info!(
            transactions = transactions.len(),
            palm = pools.palm.len(),
            shell = pools.shell.len(),
            nominees = pools.nominees.len(),
            "generated transaction network"
        );

        Ok(transactions)
    }

    /// 40 % legitimate, 20 % each for the three suspicious categories.
    fn sample_category(&mut self) -> Category {
        let r: f64 = self.rng.gen();
        if r < 0.4 {
            Category::Legitimate
        } else if r < 0.6 {
            Category::SuspiciousStructuring
        } else if r < 0.8 {
            Category::SuspiciousLarge
        } else {
            Category::Layering
        }
    }

    fn sample_parties(
        &mut self,
        pools: &Pools,
        category: Category,
    ) -> Result<(Counterparty, Counterparty)> {
        let rng = &mut self.rng;
        let (sender, receiver) = match category {
            Category::Legitimate => (
                pick_from(rng, &pools.palm, &pools.regular),
                pick_from(rng, &pools.palm, &pools.regular),
            ),
            Category::SuspiciousStructuring => (
                pools.palm.choose(rng),
                pick_from(rng, &pools.shell, &pools.nominees),
            ),
            Category::SuspiciousLarge => (pools.palm.choose(rng), pools.shell.choose(rng)),
            Category::Layering => {
                if rng.gen_bool(0.5) {
                    (
                        pools.shell.choose(rng),
                        pick_from(rng, &pools.shell, &pools.nominees),
                    )
                } else {
                    (pools.palm.choose(rng), pools.shell.choose(rng))
                }
            }
        };

        match (sender, receiver) {
            (Some(s), Some(r)) => Ok((s.clone(), r.clone())),
            _ => Err(eyre!("party pool for {category} transactions is empty")),
        }
    }

    fn draft(
        &mut self,
        seq: usize,
        category: Category,
        sender: Counterparty,
        receiver: Counterparty,
    ) -> Result<TransactionDraft> {
        let (low, high) = category.amount_range();
        let transaction_type = category
            .types()
            .choose(&mut self.rng)
            .cloned()
            .ok_or_else(|| eyre!("no transaction types for {category}"))?;
        let amount_idr = self.rng.gen_range(low..=high);
        let transaction_date = self.sample_date(category);
        let bank_code = TRANSFER_BANK_CODES
            .choose(&mut self.rng)
            .copied()
            .unwrap_or("008")
            .to_string();
        let channel = Channel::ALL
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Channel::InternetBanking);
        let cross_border = seasonal(category) && self.rng.gen_bool(self.config.cross_border_rate);

        Ok(TransactionDraft {
            transaction_id: format!("TXN_{seq:06}"),
            transaction_date,
            sender,
            receiver,
            amount_idr,
            transaction_type,
            category,
            bank_code,
            channel,
            cross_border,
        })
    }

    fn sample_date(&mut self, category: Category) -> NaiveDateTime {
        if seasonal(category) && self.rng.gen_bool(self.config.harvest_rate) {
            if let Some(date) = self.harvest_date() {
                return date;
            }
        }
        let offset = self.rng.gen_range(0..=365 * 86_400);
        self.anchor - Duration::seconds(offset)
    }

    /// Day 1-28 of a harvest month in one of the two years before the
    /// anchor year, between 08:00 and 18:59.
    fn harvest_date(&mut self) -> Option<NaiveDateTime> {
        let year = self.anchor.year() - self.rng.gen_range(1..=2);
        let month = *self.config.harvest_months.choose(&mut self.rng)?;
        let day = self.rng.gen_range(1..=28);
        let hour = self.rng.gen_range(8..=18);
        let minute = self.rng.gen_range(0..=59);
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
    }
}

/// Categories whose dates cluster around harvest season.
fn seasonal(category: Category) -> bool {
    matches!(category, Category::SuspiciousLarge | Category::Layering)
}
