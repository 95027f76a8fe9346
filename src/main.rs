use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use malaria_scraper::app::ports::PageRenderer;
use malaria_scraper::config::{Config, RendererKind};
use malaria_scraper::infra::browser::ChromeRenderer;
use malaria_scraper::infra::http_client::ReqwestRenderer;
use malaria_scraper::output::{self, OutputFormat};
use malaria_scraper::pipeline::{Pipeline, ReconcileOptions};
use malaria_scraper::reference::{self, AliasTable};
use malaria_scraper::scrapers::cdc::{CdcCrawler, CdcNormalizer, CdcTableParser};
use malaria_scraper::storage::LetterStore;
use malaria_scraper::types::Letter;
use malaria_scraper::{dataset::RiskDataset, logging};

#[derive(Parser)]
#[command(name = "malaria_scraper")]
#[command(about = "Country malaria risk table scraper and cleaner")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the per-letter tables into the data directory
    Fetch {
        /// Letters to fetch, e.g. "abc" or "a,b,c". Defaults to a-z
        #[arg(long)]
        letters: Option<String>,
        /// Fetch again even when a non-empty file is already stored
        #[arg(long)]
        force: bool,
        /// Overrides `fetch.renderer` from the config
        #[arg(long, value_enum)]
        renderer: Option<RendererKind>,
    },
    /// Parse and normalize one stored letter
    Parse {
        #[arg(long)]
        letter: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Build the country/ISO-3 reference file from a GeoJSON world map
    Reference {
        /// GeoJSON FeatureCollection, e.g. Natural Earth low-res countries
        #[arg(long)]
        geojson: PathBuf,
        /// Defaults to the configured reference file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Aggregate all stored letters and attach ISO-3 codes
    Run {
        #[arg(long)]
        letters: Option<String>,
        /// Fetch letters that are not stored yet before aggregating
        #[arg(long)]
        fetch: bool,
        /// Renderer used with --fetch; overrides `fetch.renderer`
        #[arg(long, value_enum)]
        renderer: Option<RendererKind>,
        /// Skip the ISO-3 join
        #[arg(long)]
        no_reconcile: bool,
        /// Fail when a row is left without an ISO-3 code
        #[arg(long)]
        strict: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
        /// Write to this file instead of stdout; a directory gets a timestamped file name
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn letters_arg(letters: Option<String>) -> Result<Vec<Letter>> {
    match letters {
        Some(list) => Ok(Letter::parse_list(&list)?),
        None => Ok(Letter::all()),
    }
}

fn crawler(config: &Config, kind: Option<RendererKind>) -> CdcCrawler {
    let renderer: Arc<dyn PageRenderer> = match kind.unwrap_or(config.fetch.renderer) {
        RendererKind::Browser => Arc::new(ChromeRenderer::new(config.fetch.chrome_path.clone())),
        RendererKind::Http => Arc::new(ReqwestRenderer::new()),
    };
    CdcCrawler::from_config(renderer, config)
}

async fn run_fetch(
    config: &Config,
    letters: &[Letter],
    force: bool,
    renderer: Option<RendererKind>,
) -> Result<()> {
    let store = LetterStore::new(config.data_dir());
    let report = Pipeline::fetch_tables(&crawler(config, renderer), &store, letters, force).await;

    eprintln!("\n📡 Fetch results:");
    eprintln!("   Fetched: {}", report.fetched.len());
    eprintln!("   Already stored: {}", report.cached.len());
    eprintln!("   Empty: {}", report.empty.len());
    eprintln!("   Errors: {}", report.errors.len());
    if !report.errors.is_empty() {
        warn!("{} letters failed to fetch", report.errors.len());
        for e in &report.errors {
            eprintln!("   - {}", e);
        }
    }
    Ok(())
}

fn run_parse(config: &Config, letter: &str, format: OutputFormat) -> Result<()> {
    let letter = Letter::try_from(letter)?;
    let store = LetterStore::new(config.data_dir());
    let parsed = CdcTableParser::new()
        .parse_letter(&store, letter)
        .with_context(|| format!("parsing {}", store.path_for(letter).display()))?;
    let dataset = RiskDataset::without_codes(CdcNormalizer::new().normalize_rows(parsed));
    output::write_dataset(&dataset, format, std::io::stdout().lock())?;
    Ok(())
}

fn run_reference(config: &Config, geojson: PathBuf, out: Option<PathBuf>) -> Result<()> {
    let map = reference::load_world_map(&geojson)
        .with_context(|| format!("loading {}", geojson.display()))?;
    let entries = map.reference_entries();
    let out = out.unwrap_or_else(|| config.reference_path());
    reference::write_reference_csv(&entries, &out)?;
    info!("Wrote {} reference rows to {}", entries.len(), out.display());
    eprintln!("🗺️  Wrote {} countries to {}", entries.len(), out.display());
    Ok(())
}

/// `fetch` of `Some` fetches missing letters first, with an optional renderer override.
async fn run_all(
    config: &Config,
    letters: &[Letter],
    fetch: Option<Option<RendererKind>>,
    no_reconcile: bool,
    strict: bool,
    format: OutputFormat,
    out: Option<PathBuf>,
) -> Result<()> {
    let store = LetterStore::new(config.data_dir());

    if let Some(renderer) = fetch {
        eprintln!("📥 Fetching missing letters...");
        run_fetch(config, letters, false, renderer).await?;
    }

    let reference_data;
    let aliases;
    let reconcile = if no_reconcile {
        None
    } else {
        let path = config.reference_path();
        reference_data = reference::load_reference(&path).with_context(|| {
            format!(
                "loading reference {} (build it with `malaria_scraper reference --geojson <file>`)",
                path.display()
            )
        })?;
        aliases = AliasTable::load_or_builtin(&config.aliases_path())?;
        for name in aliases.dangling_names(&reference_data) {
            warn!("Alias '{}' points at a country missing from the reference", name);
        }
        Some(ReconcileOptions {
            reference: &reference_data,
            aliases: &aliases,
            strict,
        })
    };

    let result = Pipeline::run(&store, letters, reconcile)?;

    eprintln!("\n📊 Pipeline results:");
    eprintln!("   Rows: {}", result.total_rows);
    eprintln!("   Letters with data: {}", result.letters_with_data.len());
    eprintln!("   Errors: {}", result.errors.len());
    if let Some(report) = &result.reconcile {
        eprintln!("   Codes from reference: {}", report.matched_by_reference);
        eprintln!("   Codes from aliases: {}", report.matched_by_alias);
        eprintln!("   Unresolved: {}", report.unresolved.len());
        if !report.duplicate_countries.is_empty() {
            eprintln!("   Duplicate countries: {}", report.duplicate_countries.join(", "));
        }
    }
    for e in &result.errors {
        eprintln!("   - {}", e);
    }

    match out {
        Some(path) => {
            let path = if path.is_dir() {
                output::default_output_path(&path, format)
            } else {
                path
            };
            output::write_dataset_to_file(&result.dataset, format, &path)?;
            eprintln!("💾 Saved dataset to {}", path.display());
        }
        None => output::write_dataset(&result.dataset, format, std::io::stdout().lock())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    let outcome = match cli.command {
        Commands::Fetch {
            letters,
            force,
            renderer,
        } => {
            let letters = letters_arg(letters)?;
            run_fetch(&config, &letters, force, renderer).await
        }
        Commands::Parse { letter, format } => run_parse(&config, &letter, format),
        Commands::Reference { geojson, output } => run_reference(&config, geojson, output),
        Commands::Run {
            letters,
            fetch,
            renderer,
            no_reconcile,
            strict,
            format,
            output,
        } => {
            let letters = letters_arg(letters)?;
            let fetch = fetch.then_some(renderer);
            run_all(&config, &letters, fetch, no_reconcile, strict, format, output).await
        }
    };

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    outcome
}
