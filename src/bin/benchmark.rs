/// Benchmark CLI binary for comparing retrieval and projection configurations.
///
/// Runs the harness over a probe dataset: embed → (fit projection) → rank → score.
/// Supports a single named config, "all" for the predefined comparison set, or a JSON
/// file of custom configurations. CI integration via --min-recall (exit code threshold).

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use intentrank::benchmark::dataset::load_dataset;
use intentrank::benchmark::report;
use intentrank::benchmark::runner::Harness;
use intentrank::benchmark::{default_configs, BenchmarkConfig};
use intentrank::config::Config;
use intentrank::embedding::ModelSlot;
use intentrank::intent::IntentTables;
use intentrank::logging;

#[derive(Parser)]
#[command(name = "intentrank-benchmark", about = "Probe-set benchmark for intentrank configurations")]
struct Cli {
    /// Path to the probe dataset JSON ({nodes, edges, probes})
    #[arg(long, default_value = "tests/fixtures/probe_corpus.json")]
    dataset: PathBuf,

    /// Configuration name from the predefined set, or "all"
    #[arg(long, default_value = "all")]
    config: String,

    /// JSON file with a list of configurations (replaces the predefined set)
    #[arg(long)]
    configs_file: Option<PathBuf>,

    /// Output directory for the report
    #[arg(long, default_value = "data/benchmark")]
    output_dir: PathBuf,

    /// Minimum recall@K every successful configuration must reach (e.g. 0.85)
    #[arg(long)]
    min_recall: Option<f64>,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config error (using defaults): {}", e);
        Config::default()
    });
    logging::init_logging(&config);

    let dataset = load_dataset(&cli.dataset).with_context(|| format!("loading {}", cli.dataset.display()))?;

    let available = match &cli.configs_file {
        Some(path) => {
            let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<Vec<BenchmarkConfig>>(&json)?
        }
        None => default_configs(),
    };
    let configs: Vec<BenchmarkConfig> = if cli.config == "all" {
        available
    } else {
        let names: Vec<&str> = available.iter().map(|c| c.name.as_str()).collect();
        let found = available
            .iter()
            .find(|c| c.name == cli.config)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!("Unknown config '{}'. Valid options: {}, all", cli.config, names.join(", "))
            })?;
        vec![found]
    };

    println!("=== intentrank Benchmark ===");
    println!("Dataset: {} ({} nodes, {} probes)", cli.dataset.display(), dataset.corpus.len(), dataset.probes.len());
    println!("Configurations: {}", configs.len());
    println!();

    std::fs::create_dir_all(&cli.output_dir)?;

    let tables = IntentTables::resolve(config.retrieval.tables_path.as_deref())?;
    let harness = Harness::new(ModelSlot::new(), tables, config.retrieval.clone(), config.benchmark.recall_k)
        .with_results_log(&config.benchmark.results_log)
        .with_progress(!cli.quiet);

    let results = harness.evaluate(&configs, &dataset).await;
    let report = report::generate_report(&dataset, harness.recall_k(), results);

    report::print_report(&report);
    if report.results.len() > 1 {
        report::print_comparison(&report);
        println!();
    }

    let report_path = cli
        .output_dir
        .join(format!("{}_{}.json", dataset.name, report.timestamp.format("%Y%m%dT%H%M%S")));
    report::save_report(&report, &report_path)?;
    tracing::info!(path = %report_path.display(), "Report saved");

    let failed: Vec<&str> = report
        .results
        .iter()
        .filter(|r| !r.succeeded())
        .map(|r| r.config_name.as_str())
        .collect();
    if !failed.is_empty() {
        eprintln!("WARN: {} configuration(s) failed: {}", failed.len(), failed.join(", "));
    }

    if let Some(threshold) = cli.min_recall {
        let below: Vec<String> = report
            .results
            .iter()
            .filter(|r| r.succeeded() && r.recall_at_k < threshold)
            .map(|r| format!("{} ({:.1}%)", r.config_name, r.recall_at_k * 100.0))
            .collect();
        if below.is_empty() {
            println!("PASS: every configuration reached recall@{} >= {:.1}%", report.recall_k, threshold * 100.0);
        } else {
            eprintln!(
                "FAIL: recall@{} below {:.1}%: {}",
                report.recall_k,
                threshold * 100.0,
                below.join(", ")
            );
            std::process::exit(1);
        }
    }

    Ok(())
}
