//! Weighted, saturating risk scoring

use crate::config::EngineConfig;
use crate::features::{Feature, FeatureVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Highest possible risk score
pub const MAX_SCORE: u8 = 100;

/// Per-feature scoring weights, each within `[0, max_weight]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    weights: BTreeMap<Feature, f64>,
    max_weight: f64,
}

impl WeightTable {
    /// Build a table, clamping every weight into range.
    ///
    /// Features absent from `weights` get weight 0. Non-finite or negative
    /// values become 0.
    pub fn new(weights: &BTreeMap<Feature, f64>, max_weight: f64) -> Self {
        let max_weight = if max_weight.is_finite() && max_weight > 0.0 {
            max_weight
        } else {
            0.0
        };
        let weights = Feature::ALL
            .iter()
            .map(|f| (*f, clamp_weight(weights.get(f).copied().unwrap_or(0.0), max_weight)))
            .collect();

        Self { weights, max_weight }
    }

    /// Table holding the configured default weights
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.default_weights, config.max_weight)
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.weights.get(&feature).copied().unwrap_or(0.0)
    }

    pub fn max_weight(&self) -> f64 {
        self.max_weight
    }

    pub fn as_map(&self) -> &BTreeMap<Feature, f64> {
        &self.weights
    }

    /// Copy of this table with the given features' weights raised by `step`
    pub fn bumped(&self, features: impl IntoIterator<Item = Feature>, step: f64) -> Self {
        let mut next = self.clone();
        for feature in features {
            let current = next.get(feature);
            next.weights
                .insert(feature, clamp_weight(current + step, self.max_weight));
        }
        next
    }

    /// True when every weight is finite and within `[0, max_weight]`
    pub fn is_within_bounds(&self) -> bool {
        self.weights
            .values()
            .all(|w| w.is_finite() && *w >= 0.0 && *w <= self.max_weight)
    }
}

fn clamp_weight(weight: f64, max_weight: f64) -> f64 {
    if weight.is_nan() {
        0.0
    } else {
        weight.clamp(0.0, max_weight)
    }
}

/// Result of scoring one feature vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub raw_score: u8,
    /// Points each feature added before the total was clamped
    pub contributions: BTreeMap<Feature, u32>,
}

/// Scoring model: per-feature saturating points summed into a 0-100 score
#[derive(Debug, Clone)]
pub struct ScoringModel {
    caps: BTreeMap<Feature, f64>,
}

impl ScoringModel {
    pub fn new(caps: BTreeMap<Feature, f64>) -> Self {
        Self { caps }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.contribution_caps.clone())
    }

    fn cap(&self, feature: Feature) -> f64 {
        match self.caps.get(&feature) {
            Some(cap) if cap.is_finite() && *cap > 0.0 => cap.min(MAX_SCORE as f64),
            _ => 0.0,
        }
    }

    /// Score a feature vector against a weight table
    pub fn score(&self, features: &FeatureVector, weights: &WeightTable) -> ScoreOutcome {
        let contributions: BTreeMap<Feature, u32> = Feature::ALL
            .iter()
            .map(|f| (*f, self.points(*f, features.magnitude(*f), weights.get(*f))))
            .collect();

        let total: u32 = contributions.values().sum();

        ScoreOutcome {
            raw_score: total.min(MAX_SCORE as u32) as u8,
            contributions,
        }
    }

    fn points(&self, feature: Feature, magnitude: f64, weight: f64) -> u32 {
        let raw = magnitude * weight;
        if raw.is_nan() {
            return 0;
        }
        let saturated = raw.max(0.0).min(self.cap(feature));
        saturated.round() as u32
    }
}
