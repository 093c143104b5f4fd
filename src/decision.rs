//! Decision policy: score thresholds and reason ranking

use crate::features::Feature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scores below this are approved
pub const REVIEW_THRESHOLD: u8 = 30;
/// Scores at or above this are blocked
pub const BLOCK_THRESHOLD: u8 = 70;

/// Decision outcome for a scored transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Approved,
    Reviewed,
    Blocked,
}

impl Status {
    /// Status for a raw score
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s < REVIEW_THRESHOLD => Status::Approved,
            s if s < BLOCK_THRESHOLD => Status::Reviewed,
            _ => Status::Blocked,
        }
    }

    /// Dashboard color hint
    pub fn color(&self) -> &'static str {
        match self {
            Status::Approved => "green",
            Status::Reviewed => "orange",
            Status::Blocked => "red",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Approved => write!(f, "APPROVED"),
            Status::Reviewed => write!(f, "REVIEWED"),
            Status::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// Status plus ordered reasons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub status: Status,
    pub reasons: Vec<String>,
}

/// Maps scores to decisions
#[derive(Debug, Clone, Default)]
pub struct DecisionPolicy {
    noise_floor: u32,
}

impl DecisionPolicy {
    pub fn new(noise_floor: u32) -> Self {
        Self { noise_floor }
    }

    pub fn decide(&self, raw_score: u8, contributions: &BTreeMap<Feature, u32>) -> Decision {
        Decision {
            status: Status::from_score(raw_score),
            reasons: self
                .ranked_features(contributions)
                .into_iter()
                .map(|f| f.reason().to_string())
                .collect(),
        }
    }

    /// Features above the noise floor, highest contribution first.
    ///
    /// Ties fall back to `Feature` declaration order.
    pub fn ranked_features(&self, contributions: &BTreeMap<Feature, u32>) -> Vec<Feature> {
        let mut ranked: Vec<(Feature, u32)> = contributions
            .iter()
            .filter(|(_, points)| **points > self.noise_floor)
            .map(|(f, p)| (*f, *p))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.into_iter().map(|(f, _)| f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(Status::from_score(0), Status::Approved);
        assert_eq!(Status::from_score(29), Status::Approved);
        assert_eq!(Status::from_score(30), Status::Reviewed);
        assert_eq!(Status::from_score(69), Status::Reviewed);
        assert_eq!(Status::from_score(70), Status::Blocked);
        assert_eq!(Status::from_score(100), Status::Blocked);
    }

    #[test]
    fn test_threshold_consistency_for_every_score() {
        for score in 0..=100u8 {
            let expected = if score < 30 {
                Status::Approved
            } else if score < 70 {
                Status::Reviewed
            } else {
                Status::Blocked
            };
            assert_eq!(Status::from_score(score), expected, "score {}", score);
        }
    }

    #[test]
    fn test_colors_and_wire_names() {
        assert_eq!(Status::Approved.color(), "green");
        assert_eq!(Status::Reviewed.color(), "orange");
        assert_eq!(Status::Blocked.color(), "red");
        assert_eq!(serde_json::to_string(&Status::Reviewed).unwrap(), "\"REVIEWED\"");
        assert_eq!(Status::Blocked.to_string(), "BLOCKED");
    }

    #[test]
    fn test_reasons_sorted_by_contribution() {
        let contributions = BTreeMap::from([
            (Feature::DeviceNovelty, 25),
            (Feature::AmountDeviation, 40),
            (Feature::TypingAnomaly, 20),
            (Feature::OffHours, 15),
        ]);
        let decision = DecisionPolicy::default().decide(100, &contributions);

        assert_eq!(decision.status, Status::Blocked);
        assert_eq!(
            decision.reasons,
            vec![
                "Transaction amount far above usual pattern",
                "Transaction from an unrecognized device",
                "Anomalous input timing detected",
                "Activity outside normal hours",
            ]
        );
    }

    #[test]
    fn test_ties_follow_priority_order() {
        let contributions = BTreeMap::from([
            (Feature::OffHours, 10),
            (Feature::TypingAnomaly, 10),
            (Feature::AmountDeviation, 10),
            (Feature::DeviceNovelty, 10),
        ]);
        let ranked = DecisionPolicy::default().ranked_features(&contributions);

        assert_eq!(ranked, Feature::ALL.to_vec());
    }

    #[test]
    fn test_no_reasons_when_nothing_contributes() {
        let contributions = Feature::ALL.iter().map(|f| (*f, 0)).collect();
        let decision = DecisionPolicy::default().decide(0, &contributions);

        assert_eq!(decision.status, Status::Approved);
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn test_noise_floor_filters_small_contributions() {
        let contributions = BTreeMap::from([(Feature::TypingAnomaly, 3), (Feature::OffHours, 15)]);
        let ranked = DecisionPolicy::new(5).ranked_features(&contributions);

        assert_eq!(ranked, vec![Feature::OffHours]);
    }
}
