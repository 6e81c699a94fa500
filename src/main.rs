use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use paper_enrich::config::{
    default_config_path, find_config_file, load_config, load_from_env, AmbiguityPolicy, Settings,
};
use paper_enrich::driver::EnrichmentDriver;
use paper_enrich::lookup::LookupClient;
use paper_enrich::matching::MatchResolver;
use paper_enrich::models::{CandidateField, EnrichReport, RowState};
use paper_enrich::store::{CsvStore, RecordStore};
use paper_enrich::utils::{row_number, ProgressReporter, RowSelection};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// paper-enrich - Fill in paper metadata in CSV files from bibliographic APIs
#[derive(Parser, Debug)]
#[command(name = "paper-enrich")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Enrich CSV records of academic papers with metadata from bibliographic APIs",
    long_about = None
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format for the batch report
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
}

/// Available lookup backends
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Backend {
    #[value(name = "semantic")]
    Semantic,
    #[value(name = "crossref")]
    CrossRef,
}

impl Backend {
    fn id(&self) -> &'static str {
        match self {
            Backend::Semantic => "semantic",
            Backend::CrossRef => "crossref",
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enrich the rows of a CSV file
    #[command(alias = "e")]
    Enrich {
        /// CSV file to enrich
        file: PathBuf,

        /// Rows to process as spreadsheet rows, header is row 1 (e.g. "2:10,12,15:")
        #[arg(long, short)]
        rows: Option<String>,

        /// Re-process rows whose output fields are already filled
        #[arg(long)]
        overwrite: bool,

        /// Write to a timestamped copy instead of the input file
        #[arg(long)]
        copy: bool,

        /// Lookup backend
        #[arg(long, short, value_enum)]
        backend: Option<Backend>,

        /// Metadata fields to write (comma-separated, e.g. paperId,doi,abstract)
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<CandidateField>>,

        /// Column holding the paper title
        #[arg(long)]
        title_column: Option<String>,

        /// Field delimiter of the CSV file
        #[arg(long)]
        delimiter: Option<char>,

        /// Minimum score for a match to be accepted (0-1)
        #[arg(long)]
        threshold: Option<f64>,

        /// Runner-up scores within this margin of the best make a match ambiguous
        #[arg(long)]
        tie_margin: Option<f64>,

        /// Maximum lookup calls per row, including the first
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Accept the best candidate when a match is ambiguous
        #[arg(long)]
        take_best: bool,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a configuration file with default values
    Init {
        /// Where to write it (defaults to the per-user config path)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from file if specified or found in default locations
    let (settings, config_path) = if let Some(path) = &cli.config {
        let settings = load_config(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
        (settings, Some(path.clone()))
    } else if let Some(path) = find_config_file() {
        let settings = load_config(&path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
        (settings, Some(path))
    } else {
        (load_from_env().context("Failed to read configuration")?, None)
    };

    init_tracing(&cli, &settings);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    match cli.command {
        Commands::Enrich {
            ref file,
            ref rows,
            overwrite,
            copy,
            backend,
            ref fields,
            ref title_column,
            delimiter,
            threshold,
            tie_margin,
            max_attempts,
            take_best,
        } => {
            let mut settings = settings;
            if overwrite {
                settings.enrich.overwrite = true;
            }
            if copy {
                settings.dataset.in_place = false;
            }
            if let Some(backend) = backend {
                settings.lookup.backend = backend.id().to_string();
            }
            if let Some(fields) = fields {
                settings.enrich.output_fields = fields.clone();
            }
            if let Some(column) = title_column {
                settings.enrich.title_column = column.clone();
            }
            if let Some(delimiter) = delimiter {
                settings.dataset.delimiter = delimiter.to_string();
            }
            if let Some(threshold) = threshold {
                settings.matching.threshold = threshold;
            }
            if let Some(margin) = tie_margin {
                settings.matching.tie_margin = margin;
            }
            if let Some(attempts) = max_attempts {
                settings.retry.max_attempts = attempts;
            }
            if take_best {
                settings.matching.ambiguity = AmbiguityPolicy::TakeBest;
            }
            if let Some(rows) = rows {
                settings.dataset.rows = rows.clone();
            }

            let report = enrich(&cli, file, &settings).await?;
            if cli.quiet {
                return Ok(());
            }
            output_report(&report, cli.output)?;
        }

        Commands::Config { ref action } => match action {
            ConfigAction::Init { path, force } => {
                let path = match path {
                    Some(path) => path.clone(),
                    None => default_config_path()
                        .context("Could not determine the user configuration directory")?,
                };
                if path.exists() && !force {
                    bail!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    );
                }

                // Keys come from the environment; never write them to disk
                let mut defaults = Settings::default();
                defaults.lookup.semantic_scholar_api_key = None;
                defaults.lookup.crossref_mailto = None;
                defaults.save_toml(&path)?;
                println!("Wrote default configuration to {}", path.display());
            }
            ConfigAction::Show => {
                print!("{}", settings.redacted().to_toml()?);
            }
        },
    }

    Ok(())
}

async fn enrich(cli: &Cli, file: &Path, settings: &Settings) -> Result<EnrichReport> {
    let selection: RowSelection = settings
        .dataset
        .rows
        .parse()
        .with_context(|| format!("Invalid row selection '{}'", settings.dataset.rows))?;

    let store = CsvStore::from_settings(file, &settings.dataset)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    if store.path() != store.source() {
        tracing::info!("Writing results to {}", store.path().display());
    }

    let client = LookupClient::from_settings(&settings.lookup, &settings.retry)?;
    let resolver = MatchResolver::new(settings.matching.clone());

    let total = selection.resolve(store.len()).indexes.len();
    let progress = if cli.quiet || !std::io::stderr().is_terminal() {
        ProgressReporter::quiet(total)
    } else {
        ProgressReporter::new("Enriching", total)
    };

    let mut driver = EnrichmentDriver::new(store, client, resolver, settings.enrich.clone())
        .with_progress(progress);
    let report = driver.run(&selection).await?;

    tracing::info!("Results saved to {}", driver.store().path().display());
    Ok(report)
}

fn init_tracing(cli: &Cli, settings: &Settings) {
    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => settings.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_enrich={}", env_filter)),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if settings.logging.format.as_deref() == Some("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn output_report(report: &EnrichReport, format: OutputFormat) -> Result<()> {
    let actual_format = if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    };

    match actual_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Row", "State", "Score", "Detail"]);

            for outcome in report.outcomes.iter().filter(|o| o.state != RowState::Skipped) {
                let score = outcome
                    .score
                    .map(|s| format!("{:.3}", s))
                    .unwrap_or_default();
                let detail = match (&outcome.external_id, &outcome.failure) {
                    (Some(id), _) => id.clone(),
                    (None, Some(failure)) => failure.reason(),
                    (None, None) => String::new(),
                };
                let state = Cell::new(outcome.state.to_string());
                let state = if outcome.state == RowState::Failed {
                    state.add_attribute(Attribute::Bold)
                } else {
                    state
                };

                table.add_row(vec![
                    Cell::new(row_number(outcome.index)),
                    state,
                    Cell::new(score),
                    Cell::new(detail),
                ]);
            }
            println!("{table}");

            println!(
                "{} accepted, {} skipped, {} failed",
                report.accepted, report.skipped, report.failed
            );
            if !report.out_of_range.is_empty() {
                println!("Rows outside the dataset: {:?}", report.out_of_range);
            }
        }
        OutputFormat::Auto => unreachable!(),
    }
    Ok(())
}
