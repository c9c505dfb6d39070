/// Benchmark reporting: per-configuration summaries, a comparison table across
/// configurations, JSON output for cross-run comparison and an append-only JSONL log.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dataset::Dataset;
use super::metrics::regressions;
use super::BenchmarkResult;

/// Full report for one harness invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub dataset: String,
    pub probe_count: usize,
    pub recall_k: usize,
    pub results: Vec<BenchmarkResult>,
}

impl BenchmarkReport {
    pub fn result(&self, config_name: &str) -> Option<&BenchmarkResult> {
        self.results.iter().find(|r| r.config_name == config_name)
    }

    /// Probes that `candidate` lost relative to `baseline` (hit@K before, miss after).
    pub fn regressions(&self, baseline: &str, candidate: &str) -> Option<Vec<String>> {
        let b = self.result(baseline)?;
        let c = self.result(candidate)?;
        Some(regressions(&b.probes, &c.probes))
    }

    /// Best successful configuration by MRR.
    pub fn best(&self) -> Option<&BenchmarkResult> {
        self.results
            .iter()
            .filter(|r| r.succeeded())
            .max_by(|a, b| a.mrr.partial_cmp(&b.mrr).unwrap_or(std::cmp::Ordering::Equal))
    }
}

pub fn generate_report(dataset: &Dataset, recall_k: usize, results: Vec<BenchmarkResult>) -> BenchmarkReport {
    BenchmarkReport {
        run_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        dataset: dataset.name.clone(),
        probe_count: dataset.probes.len(),
        recall_k,
        results,
    }
}

fn megabytes(bytes: usize) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Print one configuration's result to stdout.
pub fn print_result(result: &BenchmarkResult) {
    println!("=== {} ({}) ===", result.config_name, result.status);
    if let Some(e) = &result.error {
        println!("Failed during {}: {}", result.phase_reached, e);
        return;
    }
    println!("MRR: {:.3}", result.mrr);
    println!("Recall@{}: {:.1}%", result.k, result.recall_at_k * 100.0);
    if let Some(sim) = &result.type_similarity {
        println!(
            "Type similarity: intra={:.3} inter={:.3} gap={:.3}",
            sim.intra, sim.inter, sim.gap
        );
    }
    println!(
        "Latency: {:.2}ms/probe, total {}ms",
        result.mean_probe_ms, result.total_ms
    );
    println!(
        "Peak resident: {:.1} MB ({})",
        megabytes(result.peak_resident_bytes),
        if result.backends.is_empty() { "no backend".to_string() } else { result.backends.join(", ") }
    );

    let misses: Vec<&str> = result
        .probes
        .iter()
        .filter(|p| !p.hit_at_k)
        .map(|p| p.probe_id.as_str())
        .collect();
    if !misses.is_empty() {
        println!("Missed @{}: {}", result.k, misses.join(", "));
    }
}

pub fn print_report(report: &BenchmarkReport) {
    println!("=== Benchmark Report: {} ===", report.dataset);
    println!("Date: {}", report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Probes: {}  K: {}", report.probe_count, report.recall_k);
    println!();
    for result in &report.results {
        print_result(result);
        println!();
    }
}

/// Print a side-by-side comparison of every configuration in the report.
pub fn print_comparison(report: &BenchmarkReport) {
    if report.results.is_empty() {
        return;
    }

    let name_width = report
        .results
        .iter()
        .map(|r| r.config_name.len())
        .max()
        .unwrap_or(0)
        .max("Config".len());
    let recall_label = format!("R@{}", report.recall_k);

    println!("=== Configuration Comparison ===");
    println!();
    println!(
        "{:<name_width$} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>8} | {:>8} | {:<7} | Backends",
        "Config", "MRR", recall_label, "Intra", "Inter", "Gap", "ms/probe", "Peak MB", "Status",
        name_width = name_width
    );
    println!("{:-<width$}", "", width = name_width + 86);

    for r in &report.results {
        let (intra, inter, gap) = match &r.type_similarity {
            Some(s) => (format!("{:.3}", s.intra), format!("{:.3}", s.inter), format!("{:.3}", s.gap)),
            None => ("N/A".to_string(), "N/A".to_string(), "N/A".to_string()),
        };
        let (mrr, recall) = if r.succeeded() {
            (format!("{:.3}", r.mrr), format!("{:.1}%", r.recall_at_k * 100.0))
        } else {
            ("-".to_string(), "-".to_string())
        };
        println!(
            "{:<name_width$} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>8.2} | {:>8.1} | {:<7} | {}",
            r.config_name,
            mrr,
            recall,
            intra,
            inter,
            gap,
            r.mean_probe_ms,
            megabytes(r.peak_resident_bytes),
            r.status.to_string(),
            r.backends.join(" + "),
            name_width = name_width
        );
    }

    if let Some(best) = report.best() {
        println!();
        println!("Best MRR: {} ({:.3})", best.config_name, best.mrr);
    }
}

/// Save report as JSON to a file path.
pub fn save_report(report: &BenchmarkReport, path: &Path) -> Result<(), anyhow::Error> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a previously saved report from JSON.
pub fn load_report(path: &Path) -> Result<BenchmarkReport, anyhow::Error> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Append results to a JSON-lines log, one result per line. Creates the file and its
/// parent directory if needed.
pub fn append_results(path: &Path, results: &[BenchmarkResult]) -> Result<(), anyhow::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for result in results {
        let line = serde_json::to_string(result)?;
        writeln!(file, "{}", line)?;
    }
    tracing::debug!(path = %path.display(), count = results.len(), "Results appended");
    Ok(())
}

/// Read every result from a JSON-lines log. Blank lines are skipped.
pub fn load_results_log(path: &Path) -> Result<Vec<BenchmarkResult>, anyhow::Error> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut results = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let result = serde_json::from_str(&line)
            .map_err(|e| anyhow::anyhow!("{}:{}: {}", path.display(), n + 1, e))?;
        results.push(result);
    }
    Ok(results)
}
