//! Feature extraction: turns a raw transaction request into normalized risk signals

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::profiles::{device_digest, UserProfile};
use crate::TransactionRequest;
use chrono::{FixedOffset, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static USER_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.@-]{1,64}$").expect("user id pattern is a valid regex")
});

/// Behavioral and contextual signals used for scoring.
///
/// Declaration order is the tie-break priority when two features
/// contribute the same number of points.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    DeviceNovelty,
    AmountDeviation,
    TypingAnomaly,
    OffHours,
}

impl Feature {
    /// All features, in tie-break priority order
    pub const ALL: [Feature; 4] = [
        Feature::DeviceNovelty,
        Feature::AmountDeviation,
        Feature::TypingAnomaly,
        Feature::OffHours,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::DeviceNovelty => "device_novelty",
            Feature::AmountDeviation => "amount_deviation",
            Feature::TypingAnomaly => "typing_anomaly",
            Feature::OffHours => "off_hours",
        }
    }

    /// Human-readable explanation shown when the feature contributes
    pub fn reason(&self) -> &'static str {
        match self {
            Feature::DeviceNovelty => "Transaction from an unrecognized device",
            Feature::AmountDeviation => "Transaction amount far above usual pattern",
            Feature::TypingAnomaly => "Anomalous input timing detected",
            Feature::OffHours => "Activity outside normal hours",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Normalized signals for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// `(amount - baseline) / baseline`, signed
    pub amount_deviation: f64,
    /// Fingerprint not previously seen for this user
    pub device_novelty: bool,
    /// Whether the user had any device history to compare against
    pub device_history_known: bool,
    /// Absolute relative deviation from the baseline cadence
    pub typing_anomaly: f64,
    /// Local hour outside the normal-activity window
    pub off_hours: bool,
}

impl FeatureVector {
    /// Non-negative magnitude fed to the scoring model.
    ///
    /// Spending below baseline is not a risk signal. A novel device for a user
    /// with no device history at all counts as half a signal.
    pub fn magnitude(&self, feature: Feature) -> f64 {
        match feature {
            Feature::DeviceNovelty => match (self.device_novelty, self.device_history_known) {
                (false, _) => 0.0,
                (true, true) => 1.0,
                (true, false) => 0.5,
            },
            Feature::AmountDeviation => self.amount_deviation.max(0.0),
            Feature::TypingAnomaly => self.typing_anomaly.abs(),
            Feature::OffHours => {
                if self.off_hours {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Reject requests that cannot be scored
pub fn validate_request(request: &TransactionRequest) -> EngineResult<()> {
    if request.user_id.trim().is_empty() {
        return Err(EngineError::InvalidInput("user_id is required".to_string()));
    }
    if !USER_ID_PATTERN.is_match(&request.user_id) {
        return Err(EngineError::InvalidInput(format!(
            "Invalid user_id format: {}",
            request.user_id
        )));
    }
    if request.device.trim().is_empty() {
        return Err(EngineError::InvalidInput("device is required".to_string()));
    }
    if !request.amount.is_finite() || request.amount < 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "Amount must be a non-negative number, got {}",
            request.amount
        )));
    }
    if request.typing_speed == 0 {
        return Err(EngineError::InvalidInput(
            "typing_speed must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Feature extractor
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    baseline_amount: f64,
    baseline_cadence: f64,
    normal_hours_start: u32,
    normal_hours_end: u32,
    local_offset: FixedOffset,
}

impl FeatureExtractor {
    /// Create from engine configuration
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        let local_offset = config
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                EngineError::InvalidConfig(format!(
                    "utc offset out of range: {} minutes",
                    config.utc_offset_minutes
                ))
            })?;

        Ok(Self {
            baseline_amount: config.baseline_amount,
            baseline_cadence: config.baseline_cadence as f64,
            normal_hours_start: config.normal_hours_start,
            normal_hours_end: config.normal_hours_end,
            local_offset,
        })
    }

    /// Extract features for a request, given the user's profile if one exists
    pub fn extract(
        &self,
        request: &TransactionRequest,
        profile: Option<&UserProfile>,
    ) -> EngineResult<FeatureVector> {
        validate_request(request)?;

        let baseline_amount = profile
            .and_then(UserProfile::mean_amount)
            .filter(|mean| *mean > 0.0)
            .unwrap_or(self.baseline_amount);
        let amount_deviation = (request.amount - baseline_amount) / baseline_amount;

        let digest = device_digest(&request.device);
        let device_history_known = profile.is_some_and(UserProfile::has_devices);
        let device_novelty = !profile.is_some_and(|p| p.knows_device(&digest));

        let typing_anomaly =
            ((request.typing_speed as f64 - self.baseline_cadence) / self.baseline_cadence).abs();

        let hour = request.timestamp.with_timezone(&self.local_offset).hour();
        let off_hours = hour < self.normal_hours_start || hour >= self.normal_hours_end;

        Ok(FeatureVector {
            amount_deviation,
            device_novelty,
            device_history_known,
            typing_anomaly,
            off_hours,
        })
    }
}
