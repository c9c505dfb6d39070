/// Corpus data model: nodes, directed edges, and the adjacency index used by the graph signal.
///
/// The corpus is supplied by an external ingestion step and is read-only here.
/// Once built it is immutable and safe to share across concurrent queries.

pub mod text;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::projection::SourceEmbeddings;

/// Closed set of node kinds in the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Tool,
    UseCase,
    Limitation,
    Capability,
    Workflow,
    Concept,
    Integration,
    Other,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Tool => "tool",
            NodeType::UseCase => "use_case",
            NodeType::Limitation => "limitation",
            NodeType::Capability => "capability",
            NodeType::Workflow => "workflow",
            NodeType::Concept => "concept",
            NodeType::Integration => "integration",
            NodeType::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// A graph node with its indexed text and optional vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Raw embeddings from one or two source models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<SourceEmbeddings>,
    /// Projected fixed-size feature vector used by the vector signal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<f32>>,
}

impl Node {
    pub fn new(id: &str, node_type: NodeType, name: &str, description: &str) -> Self {
        Node {
            id: id.to_string(),
            node_type,
            name: name.to_string(),
            description: Some(description.to_string()),
            embeddings: None,
            features: None,
        }
    }

    /// Name and description joined, as fed to embedding backends.
    pub fn text(&self) -> String {
        match &self.description {
            Some(d) if !d.is_empty() => format!("{} {}", self.name, d),
            _ => self.name.clone(),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.name.trim().is_empty()
            || self.description.as_ref().is_some_and(|d| !d.trim().is_empty())
    }
}

/// A directed, typed relation between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default = "default_relation")]
    pub relation: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

fn default_relation() -> String {
    "related_to".to_string()
}

impl Edge {
    pub fn new(source: &str, target: &str, relation: &str) -> Self {
        Edge {
            source: source.to_string(),
            target: target.to_string(),
            relation: relation.to_string(),
            weight: None,
        }
    }
}

/// On-disk corpus format: `{ "nodes": [...], "edges": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusFile {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Immutable node collection with id lookup and an undirected adjacency view.
#[derive(Debug, Clone)]
pub struct Corpus {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
    /// Per node: (neighbor index, connection strength), strongest first, ties by id.
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl Corpus {
    /// Build a corpus, rejecting duplicate ids.
    ///
    /// Edges pointing at unknown nodes are dropped with a warning; ingestion is
    /// someone else's job and a dangling edge only loses proximity signal.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, EngineError> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(EngineError::Corpus(format!("duplicate node id '{}'", node.id)));
            }
        }

        let mut strength: Vec<HashMap<usize, f64>> = vec![HashMap::new(); nodes.len()];
        let mut kept = Vec::with_capacity(edges.len());
        for edge in edges {
            let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) else {
                tracing::warn!(
                    source = %edge.source,
                    target = %edge.target,
                    "Skipping edge with unknown endpoint"
                );
                continue;
            };
            if s != t {
                let w = edge.weight.unwrap_or(1.0).max(0.0);
                *strength[s].entry(t).or_default() += w;
                *strength[t].entry(s).or_default() += w;
            }
            kept.push(edge);
        }

        let adjacency = strength
            .into_iter()
            .map(|m| {
                let mut list: Vec<(usize, f64)> = m.into_iter().collect();
                list.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| nodes[a.0].id.cmp(&nodes[b.0].id))
                });
                list
            })
            .collect();

        tracing::debug!(nodes = nodes.len(), edges = kept.len(), "Corpus built");

        Ok(Corpus { nodes, edges: kept, index, adjacency })
    }

    pub fn from_file(file: CorpusFile) -> Result<Self, EngineError> {
        Self::new(file.nodes, file.edges)
    }

    /// Load a corpus from a JSON file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        let file: CorpusFile = serde_json::from_reader(reader)?;
        Self::from_file(file)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    /// Up to `limit` neighbors of `idx`, strongest connection first.
    pub fn neighbors(&self, idx: usize, limit: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[idx].iter().take(limit).map(|(n, _)| *n)
    }

    pub fn degree(&self, idx: usize) -> usize {
        self.adjacency[idx].len()
    }

    /// Edges as (source index, target index) pairs, the form link-prediction training uses.
    pub fn edge_indices(&self) -> Vec<(usize, usize)> {
        self.edges
            .iter()
            .filter_map(|e| Some((self.index_of(&e.source)?, self.index_of(&e.target)?)))
            .filter(|(s, t)| s != t)
            .collect()
    }

    /// Copy of this corpus with projected features attached, in node order.
    pub fn with_features(&self, features: Vec<Vec<f32>>) -> Result<Self, EngineError> {
        if features.len() != self.nodes.len() {
            return Err(EngineError::Corpus(format!(
                "expected {} feature vectors, got {}",
                self.nodes.len(),
                features.len()
            )));
        }
        let mut corpus = self.clone();
        for (node, f) in corpus.nodes.iter_mut().zip(features) {
            node.features = Some(f);
        }
        Ok(corpus)
    }
}
