/// Probe dataset: a corpus plus queries with known relevant nodes.
///
/// File format (JSON):
///
/// ```json
/// {
///   "nodes": [{"id": "kubecost", "type": "tool", "name": "Kubecost", "description": "..."}],
///   "edges": [{"source": "kubecost", "target": "grafana", "relation": "exports_to"}],
///   "probes": [{"id": "p01", "query": "track kubernetes spend", "expected": ["kubecost"]}]
/// }
/// ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, Edge, Node};
use crate::errors::EngineError;

/// A benchmark query and the node ids that count as a correct answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub id: String,
    pub query: String,
    pub expected: Vec<String>,
    /// Optional grouping label for reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DatasetFile {
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
    probes: Vec<Probe>,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub corpus: Arc<Corpus>,
    pub probes: Vec<Probe>,
}

impl Dataset {
    /// Build a dataset, checking every probe refers to nodes that exist.
    pub fn new(name: &str, corpus: Corpus, probes: Vec<Probe>) -> Result<Self, EngineError> {
        for probe in &probes {
            if probe.expected.is_empty() {
                return Err(EngineError::Corpus(format!("probe '{}' has no expected nodes", probe.id)));
            }
            if let Some(missing) = probe.expected.iter().find(|id| corpus.index_of(id).is_none()) {
                return Err(EngineError::Corpus(format!(
                    "probe '{}' expects unknown node '{}'",
                    probe.id, missing
                )));
            }
        }
        Ok(Dataset {
            name: name.to_string(),
            corpus: Arc::new(corpus),
            probes,
        })
    }

    pub fn node_texts(&self) -> Vec<String> {
        self.corpus.nodes().iter().map(|n| n.text()).collect()
    }

    pub fn probe_texts(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.query.clone()).collect()
    }
}

/// Load a dataset from a JSON file. The dataset is named after the file stem.
pub fn load_dataset(path: &Path) -> Result<Dataset, EngineError> {
    let reader = std::io::BufReader::new(std::fs::File::open(path)?);
    let file: DatasetFile = serde_json::from_reader(reader)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    let corpus = Corpus::new(file.nodes, file.edges)?;
    let dataset = Dataset::new(&name, corpus, file.probes)?;
    tracing::info!(
        dataset = %dataset.name,
        nodes = dataset.corpus.len(),
        probes = dataset.probes.len(),
        "Dataset loaded"
    );
    Ok(dataset)
}
