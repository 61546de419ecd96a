//! mobility-synth command line.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mobility_synth::catalog::PoiCatalog;
use mobility_synth::config::PipelineConfig;
use mobility_synth::evaluation::{EvaluationReport, Evaluator};
use mobility_synth::generator::TrajectoryGenerator;
use mobility_synth::llm::LazyChatClient;
use mobility_synth::orchestrator::{load_batch, BatchResult, Orchestrator};
use mobility_synth::residents::load_residents;
use mobility_synth::store::FileTrajectoryStore;
use mobility_synth::trajectory::BatchEntry;

/// Generate and evaluate synthetic daily trajectories
#[derive(Parser, Debug)]
#[command(name = "mobility-synth")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate one trajectory per resident, reusing cached ones
    Generate,

    /// Score a saved batch against the reference statistics
    Evaluate {
        /// Batch file (defaults to the configured batch output)
        #[arg(short, long)]
        batch: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate, then evaluate the fresh batch
    Run {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = PipelineConfig::load_or_default(cli.config.as_deref()).context("loading config")?;

    // Failures propagate to anyhow, which prints the full context chain once.
    match cli.command {
        Commands::Generate => {
            let catalog = load_catalog(&config)?;
            run_generate(&config, &catalog)?;
        }
        Commands::Evaluate { batch, json } => {
            let path = batch.unwrap_or_else(|| config.data.batch_output.clone());
            let entries = load_batch(&path).with_context(|| format!("loading batch {}", path.display()))?;
            let catalog = load_catalog(&config)?;
            run_evaluate(&config, &catalog, &entries, json)?;
        }
        Commands::Run { json } => {
            let catalog = load_catalog(&config)?;
            let batch = run_generate(&config, &catalog)?;
            run_evaluate(&config, &catalog, &batch.entries, json)?;
        }
        Commands::Config => print!("{}", config.to_toml()?),
    }
    Ok(())
}

fn load_catalog(config: &PipelineConfig) -> anyhow::Result<PoiCatalog> {
    let path = &config.data.poi_csv;
    PoiCatalog::from_csv_path(path, config.data.malformed_rows)
        .with_context(|| format!("loading POI catalog {}", path.display()))
}

fn run_generate(config: &PipelineConfig, catalog: &PoiCatalog) -> anyhow::Result<BatchResult> {
    let residents = load_residents(&config.data.residents_csv, config.data.malformed_rows)
        .with_context(|| format!("loading residents {}", config.data.residents_csv.display()))?;

    // The API key is only read once some resident misses the cache.
    let service = LazyChatClient::new(config.llm.clone());
    let generator = TrajectoryGenerator::new(
        catalog,
        service,
        config.generation.template()?,
        config.generation.options(),
    );
    let store = FileTrajectoryStore::open(&config.data.cache_dir)
        .with_context(|| format!("opening cache dir {}", config.data.cache_dir.display()))?;

    let mut orchestrator = Orchestrator::new(generator, store);
    let batch = orchestrator.run_to_file(&residents, &config.data.batch_output)?;
    println!(
        "generated {} trajectories ({} from cache) -> {}",
        batch.entries.len(),
        batch.summary.cache_hits,
        config.data.batch_output.display()
    );
    Ok(batch)
}

fn run_evaluate(config: &PipelineConfig, catalog: &PoiCatalog, entries: &[BatchEntry], json: bool) -> anyhow::Result<()> {
    let evaluator = Evaluator::new(catalog, config.evaluation.reference.clone());
    let report: EvaluationReport = evaluator.evaluate_batch(entries)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}
