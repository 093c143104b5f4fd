//! Engine configuration

use crate::error::{EngineError, EngineResult};
use crate::features::Feature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Risk engine configuration.
///
/// Every field has a default, so a JSON document only needs to name the
/// values it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of scored transactions retained by the ledger
    pub ledger_capacity: usize,
    /// Amount baseline for users with no spending history
    pub baseline_amount: f64,
    /// Expected typing cadence (characters per minute)
    pub baseline_cadence: u32,
    /// First local hour of the normal-activity window
    pub normal_hours_start: u32,
    /// Local hour at which the normal-activity window closes
    pub normal_hours_end: u32,
    /// Offset from UTC used to derive the local hour
    pub utc_offset_minutes: i32,
    /// Upper bound on users with a tracked profile (LRU evicted)
    pub max_tracked_users: usize,
    /// Rolling window of amounts kept per user
    pub amount_history_len: usize,
    /// Device fingerprints remembered per user
    pub device_history_len: usize,
    /// Ceiling for every feature weight
    pub max_weight: f64,
    /// Weight increment applied per confirmed fraud report
    pub learning_rate: f64,
    /// Weights used at startup when no snapshot is restored
    pub default_weights: BTreeMap<Feature, f64>,
    /// Maximum points any single feature may contribute
    pub contribution_caps: BTreeMap<Feature, f64>,
    /// Contributions at or below this value produce no reason
    pub reason_noise_floor: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ledger_capacity: 500,
            baseline_amount: 100.0,
            baseline_cadence: 80,
            normal_hours_start: 6,
            normal_hours_end: 23,
            utc_offset_minutes: 0,
            max_tracked_users: 10_000,
            amount_history_len: 50,
            device_history_len: 8,
            max_weight: 50.0,
            learning_rate: 2.0,
            default_weights: BTreeMap::from([
                (Feature::DeviceNovelty, 25.0),
                (Feature::AmountDeviation, 10.0),
                (Feature::TypingAnomaly, 20.0),
                (Feature::OffHours, 15.0),
            ]),
            contribution_caps: BTreeMap::from([
                (Feature::DeviceNovelty, 30.0),
                (Feature::AmountDeviation, 40.0),
                (Feature::TypingAnomaly, 20.0),
                (Feature::OffHours, 20.0),
            ]),
            reason_noise_floor: 0,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON configuration document
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("unparseable config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> EngineResult<()> {
        if self.ledger_capacity == 0 {
            return Err(invalid("ledger_capacity must be positive"));
        }
        if !self.baseline_amount.is_finite() || self.baseline_amount <= 0.0 {
            return Err(invalid("baseline_amount must be a positive number"));
        }
        if self.baseline_cadence == 0 {
            return Err(invalid("baseline_cadence must be positive"));
        }
        if self.normal_hours_start >= self.normal_hours_end || self.normal_hours_end > 24 {
            return Err(invalid("normal hours must satisfy start < end <= 24"));
        }
        if self.utc_offset_minutes.unsigned_abs() >= 24 * 60 {
            return Err(invalid("utc_offset_minutes must be within one day"));
        }
        if self.max_tracked_users == 0
            || self.amount_history_len == 0
            || self.device_history_len == 0
        {
            return Err(invalid("profile history bounds must be positive"));
        }
        if !self.max_weight.is_finite() || self.max_weight <= 0.0 {
            return Err(invalid("max_weight must be a positive number"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(invalid("learning_rate must be a non-negative number"));
        }
        for feature in Feature::ALL {
            match self.contribution_caps.get(&feature) {
                Some(cap) if cap.is_finite() && *cap >= 0.0 => {}
                _ => {
                    return Err(EngineError::InvalidConfig(format!(
                        "contribution cap for {} missing or invalid",
                        feature
                    )))
                }
            }
            if let Some(weight) = self.default_weights.get(&feature) {
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(EngineError::InvalidConfig(format!(
                        "default weight for {} must be a non-negative number",
                        feature
                    )));
                }
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> EngineError {
    EngineError::InvalidConfig(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config =
            EngineConfig::from_json_str(r#"{"ledger_capacity": 25, "learning_rate": 5.0}"#)
                .unwrap();

        assert_eq!(config.ledger_capacity, 25);
        assert_eq!(config.learning_rate, 5.0);
        assert_eq!(config.baseline_cadence, 80);
        assert_eq!(config.default_weights[&Feature::DeviceNovelty], 25.0);
    }

    #[test]
    fn test_weights_keyed_by_feature_name() {
        let config = EngineConfig::from_json_str(
            r#"{"default_weights": {"off_hours": 40.0, "device_novelty": 1.0}}"#,
        )
        .unwrap();

        assert_eq!(config.default_weights[&Feature::OffHours], 40.0);
        assert!(!config.default_weights.contains_key(&Feature::AmountDeviation));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let result = EngineConfig::from_json_str(r#"{"ledger_capacity": 0}"#);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_inverted_hours() {
        let config = EngineConfig {
            normal_hours_start: 22,
            normal_hours_end: 6,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_missing_cap() {
        let mut config = EngineConfig::default();
        config.contribution_caps.remove(&Feature::TypingAnomaly);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_garbage_json() {
        assert!(EngineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"baseline_amount": 85.0}"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.baseline_amount, 85.0);
        assert!(EngineConfig::from_file(dir.path().join("missing.json")).is_err());
    }
}
