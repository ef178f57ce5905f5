use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use eyre::{bail, eyre, Result, WrapErr};

use jalak_hijau::{
    config::Config,
    ingest,
    output::{self, OutputPaths},
    report::{format_idr, StrReport, DEFAULT_TOP_TRANSACTIONS},
    summary::Summary,
    transaction::{datetime_format, Transaction},
    RegistrySource,
};

#[derive(Parser)]
#[command(
    name = "jalak-hijau",
    about = "Synthetic palm-oil money-laundering case generator with transaction risk scoring and cluster detection."
)]
struct Cli {
    /// Config file (defaults to ~/.config/jalak-hijau/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate individuals and a scored transaction network
    Generate {
        /// Number of network transactions
        #[arg(long)]
        transactions: Option<usize>,

        /// Number of individual account holders
        #[arg(long)]
        individuals: Option<usize>,

        /// RNG seed for a reproducible batch
        #[arg(long)]
        seed: Option<u64>,

        /// End of the generation window ("YYYY-MM-DD" or "YYYY-MM-DD HH:MM:SS")
        #[arg(long, value_parser = parse_anchor)]
        anchor: Option<NaiveDateTime>,

        /// Registry CSV (defaults to the registry table in the output directory)
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Leave out the featured case series
        #[arg(long, default_value_t = false)]
        no_case: bool,
    },

    /// Generate the synthetic company registry
    Registry {
        /// CSV of plantation company names (column `company`)
        #[arg(long)]
        names: Option<PathBuf>,

        /// Number of shell companies
        #[arg(long)]
        shell_companies: Option<usize>,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Re-score and re-cluster an existing transactions table
    Analyze {
        /// Transactions CSV (defaults to the generated table)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Base name for the written tables
        #[arg(long)]
        base: Option<String>,
    },

    /// Render a Suspicious Transaction Report for one cluster
    Report {
        /// Transactions CSV (defaults to the generated table)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Cluster ID (defaults to the featured case, else the first cluster)
        #[arg(long)]
        cluster: Option<String>,

        /// Number of transactions to list
        #[arg(long, default_value_t = DEFAULT_TOP_TRANSACTIONS)]
        top: usize,

        /// Report date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Write the report to this file instead of stdout. An existing
        /// directory gets a STR_<cluster>_<yyyymmdd>.txt file inside it
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show the effective scoring weights, or explain one transaction's score
    Weights {
        /// Transaction ID to break down
        #[arg(long)]
        explain: Option<String>,

        /// Transactions CSV used with --explain
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

fn parse_anchor(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw, datetime_format::FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|e| format!("invalid anchor '{raw}': {e}"))
}

fn print_summary(summary: &Summary) {
    println!("Total transactions:   {}", summary.total_transactions);
    println!(
        "High-risk (>70):      {} ({:.1}%)",
        summary.high_risk_transactions,
        summary.high_risk_share() * 100.0
    );
    println!("Flagged:              {}", summary.flagged_transactions);
    println!("Cross-border:         {}", summary.cross_border_transactions);
    println!("Suspicious clusters:  {}", summary.suspicious_clusters);
    println!("Total value:          {}", format_idr(summary.total_amount_idr));
    println!("Average risk score:   {:.1}", summary.average_risk_score);
    if let Some(range) = &summary.date_range {
        println!(
            "Date range:           {} .. {}",
            range.start.format(datetime_format::FORMAT),
            range.end.format(datetime_format::FORMAT)
        );
    }
    println!("Scores digest:        {}", summary.scores_digest);
}

fn print_paths(paths: &OutputPaths) {
    eprintln!();
    eprintln!("Files saved:");
    for path in paths.written() {
        eprintln!("  {}", path.display());
    }
}

fn load_input(input: Option<PathBuf>, cfg: &Config) -> Result<(PathBuf, Vec<Transaction>)> {
    let path = input.unwrap_or_else(|| cfg.output.transactions_path());
    let transactions = ingest::load_transactions(&path)
        .wrap_err_with(|| format!("Failed to load transactions: {}", path.display()))?;
    Ok((path, transactions))
}

#[allow(clippy::too_many_arguments)]
fn cmd_generate(
    mut cfg: Config,
    transactions: Option<usize>,
    individuals: Option<usize>,
    seed: Option<u64>,
    anchor: Option<NaiveDateTime>,
    registry: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    no_case: bool,
) -> Result<()> {
    cfg.generation.transactions = transactions.unwrap_or(cfg.generation.transactions);
    cfg.generation.individuals = individuals.unwrap_or(cfg.generation.individuals);
    cfg.generation.seed = seed.or(cfg.generation.seed);
    cfg.generation.anchor = anchor.or(cfg.generation.anchor);
    cfg.output.dir = output_dir.unwrap_or(cfg.output.dir);
    if no_case {
        cfg.featured_case.enabled = false;
    }

    eprintln!("Generating JALAK-HIJAU synthetic transaction data...");
    let batch = jalak_hijau::generate_batch(&cfg, registry.as_deref())?;

    match &batch.registry_source {
        RegistrySource::File(path) => eprintln!(
            "Loaded {} companies from {}",
            batch.companies.len(),
            path.display()
        ),
        RegistrySource::Builtin => eprintln!(
            "Using built-in company data ({} companies)",
            batch.companies.len()
        ),
    }
    eprintln!("Generated {} individual accounts", batch.individuals.len());

    let paths = output::write_tables(
        &cfg.output.dir,
        &cfg.output.base,
        &batch.tables(),
        &cfg.scoring,
    )?;

    println!("JALAK-HIJAU Batch");
    println!("=================");
    println!("Anchor:               {}", batch.anchor.format(datetime_format::FORMAT));
    print_summary(&batch.summary);
    if !batch.case_study.is_empty() {
        println!(
            "Featured case:        {} ({} transactions)",
            cfg.featured_case.company_name,
            batch.case_study.len()
        );
    }
    print_paths(&paths);

    Ok(())
}

fn cmd_registry(
    mut cfg: Config,
    names: Option<PathBuf>,
    shell_companies: Option<usize>,
    seed: Option<u64>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    cfg.generation.shell_companies = shell_companies.unwrap_or(cfg.generation.shell_companies);
    cfg.generation.seed = seed.or(cfg.generation.seed);
    cfg.output.dir = output_dir.unwrap_or(cfg.output.dir);

    eprintln!("Generating synthetic company registry...");
    let profiles = jalak_hijau::generate_registry(&cfg, names.as_deref())?;
    let paths = output::write_registry(&cfg.output.dir, &cfg.output.registry_base, &profiles)?;

    let suspicious = profiles.iter().filter(|p| p.is_suspicious).count();
    let shells = profiles
        .iter()
        .filter(|p| p.company_id.starts_with("SH_"))
        .count();
    let shareholders: usize = profiles.iter().map(|p| p.pemegang_saham.len()).sum();

    println!("Company Registry");
    println!("================");
    println!("Companies:            {}", profiles.len());
    println!("Plantation:           {}", profiles.len() - shells);
    println!("Shell:                {}", shells);
    println!("Suspicious:           {}", suspicious);
    println!("Shareholder records:  {}", shareholders);

    eprintln!();
    eprintln!("Files saved:");
    for path in [&paths.companies, &paths.detailed, &paths.shareholders] {
        eprintln!("  {}", path.display());
    }

    Ok(())
}

fn cmd_analyze(
    mut cfg: Config,
    input: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    base: Option<String>,
) -> Result<()> {
    cfg.validate()?;
    let (path, transactions) = load_input(input, &cfg)?;
    eprintln!("Loaded {} transactions from {}", transactions.len(), path.display());

    let analysis = jalak_hijau::analyze(&transactions, &cfg);
    cfg.output.dir = output_dir.unwrap_or(cfg.output.dir);
    let base = base.unwrap_or(cfg.output.base.clone());
    let paths = output::write_tables(&cfg.output.dir, &base, &analysis.tables(), &cfg.scoring)?;

    println!("Transaction Analysis");
    println!("====================");
    println!("Source:               {}", path.display());
    println!("Re-scored:            {}", analysis.rescored);
    print_summary(&analysis.summary);
    print_paths(&paths);

    Ok(())
}

fn cmd_report(
    cfg: Config,
    input: Option<PathBuf>,
    cluster: Option<String>,
    top: usize,
    date: Option<NaiveDate>,
    output: Option<PathBuf>,
) -> Result<()> {
    cfg.validate()?;
    let (_, transactions) = load_input(input, &cfg)?;
    let analysis = jalak_hijau::analyze(&transactions, &cfg);

    let selected = match cluster {
        Some(id) => analysis
            .clusters
            .iter()
            .find(|c| c.cluster_id == id)
            .ok_or_else(|| eyre!("Cluster not found: {id}"))?,
        None => analysis
            .clusters
            .iter()
            .find(|c| cfg.featured_case.involves(&c.primary_entity))
            .or_else(|| analysis.clusters.first())
            .ok_or_else(|| eyre!("No suspicious clusters in the batch"))?,
    };

    let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
    let report = StrReport::new(selected, &analysis.transactions, &cfg.featured_case, date)
        .with_top(top);

    match output {
        Some(target) => {
            let path = report.output_path(&target);
            write_report(&path, &report.to_string())?;
            eprintln!("STR report saved to: {}", path.display());
        }
        None => print!("{report}"),
    }

    Ok(())
}

fn write_report(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).wrap_err_with(|| format!("Failed to write {}", path.display()))
}

fn cmd_weights(cfg: Config, explain: Option<String>, input: Option<PathBuf>) -> Result<()> {
    cfg.scoring.validate()?;

    let Some(id) = explain else {
        println!("[scoring]");
        print!("{}", toml::to_string_pretty(&cfg.scoring)?);
        println!();
        println!("[clusters]");
        print!("{}", toml::to_string_pretty(&cfg.clusters)?);
        return Ok(());
    };

    let (_, transactions) = load_input(input, &cfg)?;
    let Some(tx) = transactions.iter().find(|t| t.transaction_id == id) else {
        bail!("Transaction not found: {id}");
    };

    let breakdown = cfg.scoring.breakdown(&tx.score_input());
    let score = cfg.scoring.score(&tx.score_input());

    println!("Risk Score Breakdown");
    println!("====================");
    println!("Transaction:    {}", tx.transaction_id);
    println!("Amount:         {}", format_idr(tx.amount_idr));
    println!("Type:           {}", tx.transaction_type);
    println!("Category:       {}", tx.pattern_type);
    println!();
    println!("  amount tier:      {:>6}", breakdown.amount_tier);
    println!("  transaction type: {:>6}", breakdown.transaction_type);
    println!("  category:         {:>6}", breakdown.category);
    println!("  counterparty:     {:>6.2}", breakdown.counterparty);
    println!("  raw total:        {:>6.2}", breakdown.raw_total());
    println!();
    println!("Score:          {} (max {})", score, cfg.scoring.max_score);
    println!(
        "Flagged:        {}",
        if cfg.scoring.is_flagged(score) { "yes" } else { "no" }
    );
    if score != tx.risk_score() {
        println!("Stored score:   {} (differs under current weights)", tx.risk_score());
    }

    Ok(())
}

fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("jalak_hijau=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = Config::resolve(cli.config.as_deref()).and_then(|cfg| match cli.command {
        Commands::Generate {
            transactions,
            individuals,
            seed,
            anchor,
            registry,
            output_dir,
            no_case,
        } => cmd_generate(
            cfg,
            transactions,
            individuals,
            seed,
            anchor,
            registry,
            output_dir,
            no_case,
        ),
        Commands::Registry {
            names,
            shell_companies,
            seed,
            output_dir,
        } => cmd_registry(cfg, names, shell_companies, seed, output_dir),
        Commands::Analyze {
            input,
            output_dir,
            base,
        } => cmd_analyze(cfg, input, output_dir, base),
        Commands::Report {
            input,
            cluster,
            top,
            date,
            output,
        } => cmd_report(cfg, input, cluster, top, date, output),
        Commands::Weights { explain, input } => cmd_weights(cfg, explain, input),
    });

    if let Err(e) = result {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}
