/// Query intent detection and the intent → weight profile table.
///
/// Classification is ordered pattern/phrase matching over data-driven tables: the first
/// category whose rule matches wins, and anything unmatched is treated as a conceptual
/// (semantic) query. No model inference, no I/O after the tables are loaded.

pub mod profiles;
pub mod tables;

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

pub use profiles::{IntentProfile, ProfileTable, WeightMode};
pub use tables::IntentTables;

/// Fixed enumeration of query intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    ExactMatch,
    CapabilityCheck,
    Debugging,
    Workflow,
    Comparison,
    GoalBased,
    Exploratory,
    Semantic,
}

impl IntentCategory {
    pub const ALL: [IntentCategory; 8] = [
        IntentCategory::ExactMatch,
        IntentCategory::CapabilityCheck,
        IntentCategory::Debugging,
        IntentCategory::Workflow,
        IntentCategory::Comparison,
        IntentCategory::GoalBased,
        IntentCategory::Exploratory,
        IntentCategory::Semantic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCategory::ExactMatch => "exact_match",
            IntentCategory::CapabilityCheck => "capability_check",
            IntentCategory::Debugging => "debugging",
            IntentCategory::Workflow => "workflow",
            IntentCategory::Comparison => "comparison",
            IntentCategory::GoalBased => "goal_based",
            IntentCategory::Exploratory => "exploratory",
            IntentCategory::Semantic => "semantic",
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IntentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntentCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown intent category: {}", s))
    }
}

struct CompiledRule {
    category: IntentCategory,
    matchers: Vec<Regex>,
}

/// Heuristic intent classifier built from `IntentTables`.
pub struct IntentClassifier {
    rules: Vec<CompiledRule>,
}

impl IntentClassifier {
    /// Compile the ordered rules of `tables`.
    ///
    /// Patterns are regexes matched case-insensitively; phrases are matched as whole
    /// words. An invalid pattern is a configuration error.
    pub fn new(tables: &IntentTables) -> Result<Self, EngineError> {
        let mut rules = Vec::with_capacity(tables.rules.len());
        for rule in &tables.rules {
            let mut matchers = Vec::new();
            for pattern in &rule.patterns {
                let re = Regex::new(&format!("(?i){}", pattern)).map_err(|e| {
                    EngineError::Config(format!(
                        "invalid pattern for intent '{}': {}",
                        rule.category, e
                    ))
                })?;
                matchers.push(re);
            }
            if !rule.phrases.is_empty() {
                let alternation = rule
                    .phrases
                    .iter()
                    .map(|p| regex::escape(p.trim()))
                    .collect::<Vec<_>>()
                    .join("|");
                let re = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
                    .map_err(|e| EngineError::Config(e.to_string()))?;
                matchers.push(re);
            }
            rules.push(CompiledRule { category: rule.category, matchers });
        }
        Ok(IntentClassifier { rules })
    }

    /// Classifier over the compiled-in tables.
    pub fn builtin() -> Result<Self, EngineError> {
        Self::new(&IntentTables::builtin()?)
    }

    /// Map a query to exactly one category; defaults to `Semantic`.
    pub fn classify(&self, query: &str) -> IntentCategory {
        let query = query.trim();
        if query.is_empty() {
            return IntentCategory::Semantic;
        }
        self.rules
            .iter()
            .find(|rule| rule.matchers.iter().any(|re| re.is_match(query)))
            .map(|rule| rule.category)
            .unwrap_or(IntentCategory::Semantic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> IntentClassifier {
        IntentClassifier::builtin().unwrap()
    }

    #[test]
    fn test_category_round_trip_names() {
        for c in IntentCategory::ALL {
            assert_eq!(c.as_str().parse::<IntentCategory>().unwrap(), c);
        }
        assert!("nonsense".parse::<IntentCategory>().is_err());
    }

    #[test]
    fn test_builtin_classification() {
        let c = classifier();
        assert_eq!(c.classify("\"kube-cost-analyzer\""), IntentCategory::ExactMatch);
        assert_eq!(c.classify("terraform-drift-detector"), IntentCategory::ExactMatch);
        assert_eq!(c.classify("prometheus vs datadog"), IntentCategory::Comparison);
        assert_eq!(c.classify("why does my build fail with a timeout error"), IntentCategory::Debugging);
        assert_eq!(c.classify("does the scanner support container images"), IntentCategory::CapabilityCheck);
        assert_eq!(c.classify("how to set up canary deployments"), IntentCategory::Workflow);
        assert_eq!(c.classify("I want to save money on cloud spend"), IntentCategory::GoalBased);
        assert_eq!(c.classify("what tools exist for tracing"), IntentCategory::Exploratory);
        assert_eq!(c.classify("semantic meaning of observability"), IntentCategory::Semantic);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // Both debugging ("error") and workflow ("how to") phrases; debugging is listed first
        assert_eq!(classifier().classify("how to fix this error"), IntentCategory::Debugging);
    }

    #[test]
    fn test_never_fails_on_odd_input() {
        let c = classifier();
        assert_eq!(c.classify(""), IntentCategory::Semantic);
        assert_eq!(c.classify("   "), IntentCategory::Semantic);
        assert_eq!(c.classify("???"), IntentCategory::Semantic);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let mut tables = IntentTables::builtin().unwrap();
        tables.rules[0].patterns.push("(unclosed".to_string());
        assert!(matches!(IntentClassifier::new(&tables), Err(EngineError::Config(_))));
    }
}
