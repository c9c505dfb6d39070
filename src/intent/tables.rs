/// Versioned, data-driven intent tables.
///
/// One TOML document carries the ordered classification rules, the intent keyword
/// vocabulary used by the keyword signal boost, and the weight profiles. The default
/// document is compiled in; `retrieval.tables_path` swaps in a replacement at startup.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use figment::{
    Figment,
    providers::{Format, Toml},
};
use serde::Deserialize;

use crate::corpus::text::tokenize;
use crate::errors::EngineError;

use super::{IntentCategory, IntentProfile, ProfileTable};

/// Table format version this build understands.
pub const SUPPORTED_VERSION: u32 = 1;

const BUILTIN_TABLES: &str = include_str!("default_tables.toml");

#[derive(Debug, Deserialize)]
struct TablesDocument {
    version: u32,
    #[serde(default)]
    intents: Vec<RuleDocument>,
    #[serde(default)]
    intent_keywords: KeywordDocument,
    #[serde(default)]
    profiles: BTreeMap<String, IntentProfile>,
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    category: String,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    phrases: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct KeywordDocument {
    #[serde(default)]
    terms: Vec<String>,
}

/// A single ordered classification rule.
#[derive(Debug, Clone)]
pub struct IntentRule {
    pub category: IntentCategory,
    pub patterns: Vec<String>,
    pub phrases: Vec<String>,
}

/// Parsed and validated intent tables.
#[derive(Debug, Clone)]
pub struct IntentTables {
    pub version: u32,
    pub rules: Vec<IntentRule>,
    /// Normalized (tokenized) intent keyword terms
    pub intent_keywords: HashSet<String>,
    pub profiles: ProfileTable,
}

impl IntentTables {
    /// The tables compiled into the binary.
    pub fn builtin() -> Result<Self, EngineError> {
        Self::parse(BUILTIN_TABLES)
    }

    /// Load tables from a TOML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read intent tables {}: {}", path.display(), e))
        })?;
        let tables = Self::parse(&text)?;
        tracing::info!(
            path = %path.display(),
            version = tables.version,
            rules = tables.rules.len(),
            "Loaded intent tables"
        );
        Ok(tables)
    }

    /// Builtin tables unless a replacement path is configured.
    pub fn resolve(path: Option<&str>) -> Result<Self, EngineError> {
        match path {
            Some(p) => Self::load(Path::new(p)),
            None => Self::builtin(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, EngineError> {
        let doc: TablesDocument = Figment::from(Toml::string(text))
            .extract()
            .map_err(|e| EngineError::Config(format!("invalid intent tables: {}", e)))?;

        if doc.version != SUPPORTED_VERSION {
            return Err(EngineError::Config(format!(
                "unsupported intent table version {} (expected {})",
                doc.version, SUPPORTED_VERSION
            )));
        }

        let mut rules = Vec::with_capacity(doc.intents.len());
        for rule in doc.intents {
            let category: IntentCategory = rule.category.parse().map_err(EngineError::Config)?;
            rules.push(IntentRule {
                category,
                patterns: rule.patterns,
                phrases: rule.phrases,
            });
        }

        let intent_keywords = doc
            .intent_keywords
            .terms
            .iter()
            .flat_map(|t| tokenize(t))
            .collect();

        let mut profiles = BTreeMap::new();
        for (name, profile) in doc.profiles {
            let category: IntentCategory = name.parse().map_err(EngineError::Config)?;
            profiles.insert(category, profile);
        }
        let profiles = ProfileTable::new(profiles)?;

        Ok(IntentTables {
            version: doc.version,
            rules,
            intent_keywords,
            profiles,
        })
    }
}
