use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use intentrank::config::Config;
use intentrank::corpus::Corpus;
use intentrank::embedding::{embed_sources, ModelSlot};
use intentrank::intent::{IntentClassifier, IntentProfile, IntentTables, WeightMode};
use intentrank::logging;
use intentrank::projection::{FitData, ProjectionModel, ProjectionStrategy, Projector, SourceEmbeddings};
use intentrank::search::{Query, Ranking, RetrievalEngine};

#[derive(Parser)]
#[command(name = "intentrank", version, about = "Intent-adaptive hybrid retrieval over a knowledge graph")]
struct Cli {
    /// Configuration file (defaults to ./intentrank.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the intent category and weight profile chosen for a query
    Classify {
        query: String,
    },
    /// Rank a corpus for a query
    Retrieve {
        query: String,
        /// Corpus JSON ({nodes, edges})
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        min_confidence: Option<f64>,
        /// Use the global baseline profile instead of intent-adaptive weights
        #[arg(long)]
        fixed: bool,
        /// Embed the corpus and query with the configured backends and enable the vector signal
        #[arg(long)]
        embed: bool,
        /// Previously fitted projection model (implies --embed)
        #[arg(long)]
        model: Option<PathBuf>,
        /// Print the ranking as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fit a projection model over a corpus and save it as JSON
    Fit {
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Override projection.strategy
        #[arg(long)]
        strategy: Option<ProjectionStrategy>,
        /// Override projection.target_dim
        #[arg(long)]
        target_dim: Option<usize>,
    },
    /// Print the intent → weight profile table
    Profiles,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Config error (using defaults): {}", e);
            Config::default()
        }),
    };

    logging::init_logging(&config);

    let tables = IntentTables::resolve(config.retrieval.tables_path.as_deref())?;

    match cli.command {
        Commands::Classify { query } => {
            let intent = IntentClassifier::new(&tables)?.classify(&query);
            let p = tables.profiles.get(intent);
            println!(
                "{}  vector={:.2} keyword={:.2} graph={:.2}",
                intent, p.vector, p.keyword, p.graph
            );
        }

        Commands::Profiles => {
            println!("{:<18} {:>7} {:>8} {:>6}", "intent", "vector", "keyword", "graph");
            for (intent, p) in tables.profiles.iter() {
                println!("{:<18} {:>7.2} {:>8.2} {:>6.2}", intent.as_str(), p.vector, p.keyword, p.graph);
            }
            let b = IntentProfile::baseline();
            println!("{:<18} {:>7.2} {:>8.2} {:>6.2}", "(fixed baseline)", b.vector, b.keyword, b.graph);
        }

        Commands::Retrieve { query, corpus, limit, min_confidence, fixed, embed, model, json } => {
            let base = Corpus::load(&corpus).with_context(|| format!("loading {}", corpus.display()))?;
            let mut q = Query::new(&query);
            if let Some(limit) = limit {
                q = q.with_limit(limit);
            }
            if let Some(min) = min_confidence {
                q = q.with_min_confidence(min);
            }

            let corpus = if embed || model.is_some() {
                let (with_features, query_vector) = project_corpus(&config, &base, &query, model.as_deref()).await?;
                q = q.with_embedding(query_vector);
                with_features
            } else {
                base
            };

            let mode = if fixed { WeightMode::baseline() } else { WeightMode::Adaptive };
            let engine = RetrievalEngine::new(Arc::new(corpus), &tables, &config.retrieval)?.with_mode(mode)?;
            let ranking = engine.retrieve(&q)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&ranking)?);
            } else {
                print_ranking(&ranking);
            }
        }

        Commands::Fit { corpus, output, strategy, target_dim } => {
            let base = Corpus::load(&corpus).with_context(|| format!("loading {}", corpus.display()))?;
            let mut projection = config.projection.clone();
            if let Some(s) = strategy {
                projection.strategy = s;
            }
            if let Some(d) = target_dim {
                projection.target_dim = d;
            }

            let samples = match FitData::from_corpus(&base) {
                Ok(data) => data.samples,
                Err(_) => {
                    tracing::info!("Corpus carries no embeddings, embedding node texts");
                    let texts: Vec<String> = base.nodes().iter().map(|n| n.text()).collect();
                    embed_sources(
                        &ModelSlot::new(),
                        &config.embedding.primary,
                        config.embedding.secondary.as_ref(),
                        &texts,
                    )
                    .await?
                    .embeddings
                }
            };
            let data = FitData::new(samples, base.edge_indices());

            let model = tokio::task::spawn_blocking(move || intentrank::projection::fit(&projection, &data))
                .await
                .context("projection fitting task")??;
            model.save(&output)?;
            println!(
                "Saved {} model ({} -> {} dims, {} parameters) to {}",
                model.strategy,
                model.source_dims,
                model.target_dim,
                model.parameter_count(),
                output.display()
            );
        }
    }

    Ok(())
}

/// Embed node texts and the query, project both, and attach the node features.
/// Returns the featured corpus and the projected query vector.
async fn project_corpus(
    config: &Config,
    corpus: &Corpus,
    query: &str,
    model_path: Option<&Path>,
) -> Result<(Corpus, Vec<f32>)> {
    let slot = ModelSlot::new();
    let mut texts: Vec<String> = corpus.nodes().iter().map(|n| n.text()).collect();
    texts.push(query.to_string());
    let mut embedded = embed_sources(
        &slot,
        &config.embedding.primary,
        config.embedding.secondary.as_ref(),
        &texts,
    )
    .await?
    .embeddings;
    let query_source: SourceEmbeddings = embedded
        .pop()
        .ok_or_else(|| anyhow::anyhow!("no embedding returned for the query"))?;
    let data = FitData::new(embedded, corpus.edge_indices());

    let (features, query_vector) = match model_path {
        Some(path) => {
            let model = ProjectionModel::load(path)?;
            if !model.is_valid_for(data.fingerprint(), model.target_dim) {
                tracing::warn!(path = %path.display(), "Projection model was fitted on different data");
            }
            (model.project_all(&data.samples)?, model.project(&query_source)?)
        }
        None => {
            let mut projector = Projector::new(config.projection.clone())?;
            let model = projector.ensure_fitted(&data)?;
            (model.project_all(&data.samples)?, model.project(&query_source)?)
        }
    };

    Ok((corpus.with_features(features)?, query_vector))
}

fn print_ranking(ranking: &Ranking) {
    let p = &ranking.profile;
    println!(
        "intent: {}  (vector={:.2} keyword={:.2} graph={:.2})",
        ranking.intent, p.vector, p.keyword, p.graph
    );
    if ranking.hits.is_empty() {
        println!("no matches");
        return;
    }
    for (i, hit) in ranking.hits.iter().enumerate() {
        println!(
            "{:>3}. {:<32} {:.4}  [v={:.3} k={:.3} g={:.3}] {}",
            i + 1,
            hit.node_id,
            hit.score,
            hit.breakdown.vector,
            hit.breakdown.keyword,
            hit.breakdown.graph,
            hit.node_type
        );
    }
}
