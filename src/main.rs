//! CLI entry point for `sproc-lineage`.

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sproc_lineage::catalog::{CatalogLoader, FileCatalogLoader};
use sproc_lineage::config::LineageConfig;
use sproc_lineage::error::LineageError;
use sproc_lineage::output::formatter;
use sproc_lineage::parser::sql_parser::SqlServerParser;
use sproc_lineage::pipeline::feed::DirectoryFeed;
use sproc_lineage::pipeline::orchestrator::Pipeline;

#[derive(Parser)]
#[command(
    name = "sproc-lineage",
    about = "Extract table and portfolio-code lineage from SQL Server stored procedures"
)]
struct Cli {
    /// Directory of `<routine>.sql` definition files
    #[arg(long)]
    routines_dir: PathBuf,

    /// Whitelist of known table names, one per line
    #[arg(long)]
    tables: PathBuf,

    /// CSV of portfolio codes (every non-empty cell is a code)
    #[arg(long)]
    portfolios: PathBuf,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database whose three-part names collapse to the bare table name
    #[arg(long)]
    home_database: Option<String>,

    /// Number of parallel workers
    #[arg(long)]
    workers: Option<usize>,

    /// Skip token-level recovery on unparseable batches
    #[arg(long)]
    fast: bool,

    /// Output directory (defaults to `<date>_<label>`)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Label for the dated default output directory
    #[arg(long, default_value = "lineage")]
    label: String,

    /// Do not draw a progress bar
    #[arg(long)]
    no_progress: bool,

    /// Print debug diagnostics
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        process::exit(2);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<(), LineageError> {
    let config = load_config(cli)?;
    let output_dir = match &cli.output_dir {
        Some(dir) => dir.clone(),
        None => {
            let date = chrono::Local::now().format("%Y-%m-%d").to_string();
            formatter::dated_output_dir(Path::new("."), &date, &cli.label)?
        }
    };

    let catalog = FileCatalogLoader::new(&cli.tables, &cli.portfolios).load()?;
    info!(
        tables = catalog.table_count(),
        portfolio_codes = catalog.portfolio_code_count(),
        "catalog loaded"
    );

    let mut feed = DirectoryFeed::open(&cli.routines_dir)?;
    info!(routines = feed.remaining(), "found routine definitions");

    let parser = SqlServerParser::from_config(&config);
    let progress = progress_bar(feed.remaining() as u64, cli.no_progress);
    let reports = Pipeline::new(&catalog, &parser, &config)
        .with_progress(progress.clone())
        .run(&mut feed)?;
    progress.finish_and_clear();

    formatter::write_reports(&output_dir, &reports)?;
    info!(
        dir = %output_dir.display(),
        tables = reports.tables_used.rows.len(),
        portfolio_codes = reports.portfolio_codes.rows.len(),
        parse_errors = reports.error_counts.total(),
        "reports written"
    );
    Ok(())
}

fn load_config(cli: &Cli) -> Result<LineageConfig, LineageError> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| {
                LineageError::Config(format!("failed to read {}: {e}", path.display()))
            })?;
            LineageConfig::from_json(&json)?
        }
        None => LineageConfig::default(),
    };
    if let Some(db) = &cli.home_database {
        config = config.with_home_database(db);
    }
    if let Some(workers) = cli.workers {
        config = config.with_pool_size(workers);
    }
    if cli.fast {
        config.tolerant_recovery = false;
    }
    config.validated()
}

fn progress_bar(len: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} routines")
    {
        bar.set_style(style);
    }
    bar
}
