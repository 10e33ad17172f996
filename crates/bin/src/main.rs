//! Lead-lag CLI binary.
//!
//! Computes the lead-lag factor table from the feeds in a data directory and
//! reports, selects or exports it.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use leadlag::factors::{LLFactor, LeadLagMeasure, available_measures, get_measure_info};
use leadlag::output::{ExportFormat, Exporter, FactorSummary, factor_records};
use leadlag::{LeadLagPipeline, PipelineConfig};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "leadlag")]
#[command(about = "Lead-lag factor between industry cash flows and GDP", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the input feeds
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Cache directory for computed tables
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Recompute everything without reading or writing the cache
    #[arg(long, global = true)]
    test: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the factor table
    Factor {
        /// Export long-format records to this file (.csv or .json)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Select one factor column
    Select {
        /// LL_max, LL_average or LL_industry
        #[arg(long)]
        measure: String,

        /// Cash-flow measure, e.g. EBITDA
        #[arg(long)]
        cashflow: String,

        /// Move every period forward by this many quarters
        #[arg(long, default_value = "0")]
        shift: i64,

        /// Export long-format records to this file (.csv or .json)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Newey-West t-test of every factor column
    Summary {
        /// Print Markdown instead of a terminal table
        #[arg(long)]
        markdown: bool,

        /// Export the summary to this file (.csv or .json)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show the size of every filtered window
    Windows,

    /// List the lead-lag measures
    Measures,

    /// Print the effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
            return Ok(());
        }
        Commands::Measures => {
            list_measures();
            return Ok(());
        }
        _ => {}
    }

    let pipeline = LeadLagPipeline::new(config)?;
    match cli.command {
        Commands::Factor { output } => {
            let table = compute(&pipeline)?;
            match output {
                Some(path) => export_records(&table, &path)?,
                None => println!("{}", table),
            }
        }
        Commands::Select {
            measure,
            cashflow,
            shift,
            output,
        } => {
            let measure = parse_measure(&measure)?;
            let table = compute(&pipeline)?;
            let mut factor = LLFactor::select(&table, measure, &cashflow)?;
            if shift != 0 {
                factor = factor.shifted(shift)?;
            }
            print_selected(&factor, output.as_deref())?;
        }
        Commands::Summary { markdown, output } => {
            let table = compute(&pipeline)?;
            let summary = FactorSummary::from_table("lead-lag", &table)?;
            if let Some(path) = output {
                summary.export_to_file(&path, format_for(&path)?)?;
                println!("Summary written to {}", path.display());
            } else if markdown {
                print!("{}", summary.to_markdown());
            } else {
                print!("{}", summary.to_ascii_table());
            }
        }
        Commands::Windows => {
            let summaries = pipeline.window_summaries()?;
            println!(
                "{} windows of {} quarters",
                summaries.len(),
                pipeline.config().lead_lag.window_length()
            );
            for summary in summaries {
                println!("  {}", summary);
            }
        }
        Commands::Config | Commands::Measures => {}
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data.dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache.dir = Some(dir.clone());
    }
    if cli.test {
        config.cache.test = true;
    }
    debug!(file = ?cli.config, test = config.cache.test, "configuration resolved");
    Ok(config)
}

/// Compute (or load) the factor table behind a spinner.
fn compute(pipeline: &LeadLagPipeline) -> Result<DataFrame, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Computing lead-lag factor...");

    let mut windows = 0;
    let result = pipeline.lead_lag_with(|summary| {
        windows += 1;
        pb.set_message(format!("Window {} ({})", summary.anchor, windows));
    });

    match &result {
        Ok(table) if windows > 0 => pb.finish_with_message(format!(
            "Computed {} windows, {} rows",
            windows,
            table.height()
        )),
        Ok(table) => pb.finish_with_message(format!("Loaded {} rows from cache", table.height())),
        Err(_) => pb.finish_and_clear(),
    }
    Ok(result?)
}

fn list_measures() {
    println!("Lead-lag measures:");
    println!("==================\n");

    for info in available_measures() {
        println!("{:12} {}", info.name, info.description);
    }
}

fn parse_measure(name: &str) -> Result<LeadLagMeasure, Box<dyn std::error::Error>> {
    match get_measure_info(name) {
        Some(info) => Ok(info.measure),
        None => {
            let known: Vec<&str> = available_measures().iter().map(|m| m.name).collect();
            Err(format!("unknown measure '{}' (expected one of {})", name, known.join(", ")).into())
        }
    }
}

fn format_for(path: &Path) -> Result<ExportFormat, Box<dyn std::error::Error>> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    Ok(ExportFormat::from_extension(extension)?)
}

fn export_records(table: &DataFrame, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let records = factor_records(table)?;
    records.export_to_file(path, format_for(path)?)?;
    println!("{} records written to {}", records.len(), path.display());
    Ok(())
}

fn print_selected(
    factor: &LLFactor,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => export_records(factor.frame(), path),
        None => {
            println!("{}", factor.column_name());
            println!("{}", factor.frame());
            Ok(())
        }
    }
}
