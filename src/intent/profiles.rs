/// Weight profiles: how much each signal counts for a given intent.
///
/// A profile is (vector, keyword, graph). Every profile must be non-negative and sum to
/// 1.0 so the fused score stays in [0, 1]. The table is built once at startup and is
/// never mutated afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

use super::IntentCategory;

/// Allowed deviation of a profile's weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentProfile {
    pub vector: f64,
    pub keyword: f64,
    pub graph: f64,
}

impl IntentProfile {
    pub const fn new(vector: f64, keyword: f64, graph: f64) -> Self {
        IntentProfile { vector, keyword, graph }
    }

    /// The non-adaptive baseline used before intent-specific weighting.
    pub const fn baseline() -> Self {
        IntentProfile::new(0.40, 0.45, 0.15)
    }

    pub fn sum(&self) -> f64 {
        self.vector + self.keyword + self.graph
    }

    pub fn validate(&self, name: &str) -> Result<(), EngineError> {
        let weights = [self.vector, self.keyword, self.graph];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngineError::invalid_profile(name, "weights must be finite and non-negative"));
        }
        if (self.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::invalid_profile(
                name,
                &format!("weights sum to {:.6}, expected 1.0", self.sum()),
            ));
        }
        Ok(())
    }

    /// Fused score for the three signal values.
    pub fn fuse(&self, vector: f64, keyword: f64, graph: f64) -> f64 {
        self.vector * vector + self.keyword * keyword + self.graph * graph
    }
}

/// Complete intent → profile lookup. Every category has a validated profile.
#[derive(Debug, Clone)]
pub struct ProfileTable {
    profiles: BTreeMap<IntentCategory, IntentProfile>,
}

impl ProfileTable {
    pub fn new(profiles: BTreeMap<IntentCategory, IntentProfile>) -> Result<Self, EngineError> {
        for category in IntentCategory::ALL {
            match profiles.get(&category) {
                Some(p) => p.validate(category.as_str())?,
                None => {
                    return Err(EngineError::invalid_profile(category.as_str(), "profile missing from table"))
                }
            }
        }
        Ok(ProfileTable { profiles })
    }

    pub fn get(&self, category: IntentCategory) -> IntentProfile {
        // Construction guarantees every category is present.
        self.profiles
            .get(&category)
            .copied()
            .unwrap_or_else(IntentProfile::baseline)
    }

    pub fn iter(&self) -> impl Iterator<Item = (IntentCategory, IntentProfile)> + '_ {
        self.profiles.iter().map(|(c, p)| (*c, *p))
    }
}

/// How the fusion scorer picks its weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WeightMode {
    /// Select the profile matching the query's detected intent.
    Adaptive,
    /// One global profile for every query.
    Fixed(IntentProfile),
}

impl WeightMode {
    pub fn baseline() -> Self {
        WeightMode::Fixed(IntentProfile::baseline())
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            WeightMode::Adaptive => Ok(()),
            WeightMode::Fixed(p) => p.validate("fixed"),
        }
    }
}
