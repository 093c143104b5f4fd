//! # FraudGuard Engine
//!
//! In-process transaction risk scoring for the FraudGuard dashboard.
//!
//! ## Features
//!
//! - **Feature Extraction**: amount deviation, device novelty, typing cadence
//!   and off-hours signals from a raw transaction request
//! - **Saturating Scoring**: weighted per-feature points, each capped, summed
//!   into a 0-100 risk score
//! - **Decision Policy**: APPROVED / REVIEWED / BLOCKED with ranked reasons
//! - **Feedback Learning**: bounded weight reinforcement from fraud reports
//! - **Transaction Ledger**: fixed-capacity rolling history with dashboard stats
//! - **Pluggable Persistence**: weight snapshots written off the scoring path
//!
//! A single [`RiskEngine`] owns all mutable state. Share it between request
//! workers as an `Arc<RiskEngine>`.

pub mod config;
pub mod decision;
pub mod error;
pub mod features;
pub mod feedback;
pub mod ledger;
pub mod persistence;
pub mod profiles;
pub mod scoring;
#[cfg(feature = "synthetic")]
pub mod synthetic;

pub use config::EngineConfig;
pub use decision::{Decision, DecisionPolicy, Status};
pub use error::{EngineError, EngineResult, StoreError};
pub use features::{Feature, FeatureExtractor, FeatureVector};
pub use feedback::{FeedbackLearner, WeightCell};
pub use ledger::{LedgerStats, TransactionId, TransactionLedger, TransactionSummary};
pub use persistence::{JsonFileStore, MemoryStore, WeightStore};
pub use scoring::{ScoreOutcome, ScoringModel, WeightTable};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use persistence::PersistenceWorker;
use profiles::ProfileStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Transaction submitted for scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub user_id: String,
    pub amount: f64,
    /// Device fingerprint
    pub device: String,
    /// Typing cadence in characters per minute
    pub typing_speed: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub merchant: Option<String>,
}

/// A request together with its score and decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTransaction {
    pub request: TransactionRequest,
    pub risk_score: u8,
    pub status: Status,
    /// Highest contribution first
    pub reasons: Vec<String>,
    pub contributions: BTreeMap<Feature, u32>,
}

/// Response returned to the submitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub transaction_id: TransactionId,
    pub risk_score: u8,
    pub status: Status,
    pub color: String,
    pub reasons: Vec<String>,
    pub contributions: BTreeMap<Feature, u32>,
}

impl Assessment {
    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Snapshot of the engine's learned state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub tracked_users: usize,
    pub ledger_len: usize,
    pub ledger_capacity: usize,
    pub weights: BTreeMap<Feature, f64>,
    pub max_weight: f64,
    pub reports_applied: u64,
}

/// Risk scoring engine
#[derive(Debug)]
pub struct RiskEngine {
    config: EngineConfig,
    extractor: FeatureExtractor,
    model: ScoringModel,
    policy: DecisionPolicy,
    learner: FeedbackLearner,
    weights: WeightCell,
    profiles: RwLock<ProfileStore>,
    ledger: TransactionLedger,
    persistence: Option<PersistenceWorker>,
    reports_applied: AtomicU64,
}

impl RiskEngine {
    /// Create an engine starting from the configured default weights
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let weights = WeightTable::from_config(&config);
        Self::build(config, weights, None)
    }

    /// Create an engine whose weights are restored from, and saved to, `store`
    pub fn with_store(config: EngineConfig, store: Arc<dyn WeightStore>) -> EngineResult<Self> {
        let weights = match store.load()? {
            Some(restored) => {
                log::info!("Restored weight table from store");
                // Re-clamp in case the configured ceiling changed since the save
                WeightTable::new(restored.as_map(), config.max_weight)
            }
            None => WeightTable::from_config(&config),
        };
        Self::build(config, weights, Some(PersistenceWorker::spawn(store)))
    }

    fn build(
        config: EngineConfig,
        weights: WeightTable,
        persistence: Option<PersistenceWorker>,
    ) -> EngineResult<Self> {
        config.validate()?;

        Ok(Self {
            extractor: FeatureExtractor::from_config(&config)?,
            model: ScoringModel::from_config(&config),
            policy: DecisionPolicy::new(config.reason_noise_floor),
            learner: FeedbackLearner::new(config.learning_rate),
            weights: WeightCell::new(weights),
            profiles: RwLock::new(ProfileStore::new(
                config.max_tracked_users,
                config.amount_history_len,
                config.device_history_len,
            )),
            ledger: TransactionLedger::new(config.ledger_capacity),
            persistence,
            reports_applied: AtomicU64::new(0),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Score a request without recording it anywhere
    pub fn evaluate(&self, request: &TransactionRequest) -> EngineResult<ScoredTransaction> {
        let features = {
            let profiles = self.profiles.read();
            self.extractor.extract(request, profiles.get(&request.user_id))
        };
        let features = features.map_err(|e| {
            log::warn!("Rejected transaction for {}: {}", request.user_id, e);
            e
        })?;

        let weights = self.weights.snapshot();
        let outcome = self.model.score(&features, &weights);
        let decision = self.policy.decide(outcome.raw_score, &outcome.contributions);

        Ok(ScoredTransaction {
            request: request.clone(),
            risk_score: outcome.raw_score,
            status: decision.status,
            reasons: decision.reasons,
            contributions: outcome.contributions,
        })
    }

    /// Score a request, learn from it and record it in the ledger
    pub fn submit(&self, request: TransactionRequest) -> EngineResult<Assessment> {
        let scored = self.evaluate(&request)?;

        // Blocked traffic must not become part of the user's baseline
        if scored.status != Status::Blocked {
            self.profiles.write().record(&request);
        }

        let (risk_score, status) = (scored.risk_score, scored.status);
        let reasons = scored.reasons.clone();
        let contributions = scored.contributions.clone();
        let transaction_id = self.ledger.append(scored);

        let assessment = Assessment {
            transaction_id,
            risk_score,
            status,
            color: status.color().to_string(),
            reasons,
            contributions,
        };

        log::debug!(
            "Scored transaction {} for {}: score={} status={}",
            assessment.transaction_id,
            request.user_id,
            assessment.risk_score,
            assessment.status
        );

        Ok(assessment)
    }

    /// Learn user baselines from historical transactions.
    ///
    /// Invalid requests are skipped. Returns how many were learned from.
    pub fn seed_history(&self, history: &[TransactionRequest]) -> usize {
        let mut profiles = self.profiles.write();
        let mut learned = 0;

        for request in history {
            match features::validate_request(request) {
                Ok(()) => {
                    profiles.record(request);
                    learned += 1;
                }
                Err(e) => log::warn!("Skipping historical transaction: {}", e),
            }
        }

        log::info!(
            "Seeded profiles from {} of {} historical transactions ({} users tracked)",
            learned,
            history.len(),
            profiles.len()
        );
        learned
    }

    /// Up to `k` ledger rows, most recent first
    pub fn recent_transactions(&self, k: usize) -> Vec<TransactionSummary> {
        self.ledger.recent_summaries(k)
    }

    /// Reinforce the weights of every feature implicated in a confirmed
    /// fraudulent transaction
    pub fn report_fraud(&self, id: TransactionId) -> EngineResult<()> {
        let entry = self.ledger.get(id).ok_or_else(|| {
            log::warn!("Fraud report for unknown transaction {}", id);
            EngineError::NotFound(id)
        })?;

        let updated = self.learner.reinforce(
            &self.weights,
            &entry.transaction.contributions,
            |next| self.persist(Arc::clone(next)),
        );
        self.reports_applied.fetch_add(1, Ordering::Relaxed);

        log::info!(
            "Fraud report applied for {} (score {}), weights now {:?}",
            id,
            entry.transaction.risk_score,
            updated.as_map()
        );
        Ok(())
    }

    /// Restore the configured default weights
    pub fn reset_weights(&self) {
        self.weights
            .reset(WeightTable::from_config(&self.config), |next| {
                self.persist(Arc::clone(next))
            });
        log::info!("Weight table reset to defaults");
    }

    /// Queue a table for saving. Called under the weight write lock so the
    /// worker receives tables in publication order.
    fn persist(&self, weights: Arc<WeightTable>) {
        if let Some(worker) = &self.persistence {
            worker.enqueue(weights);
        }
    }

    /// Current weight table
    pub fn weights(&self) -> Arc<WeightTable> {
        self.weights.snapshot()
    }

    pub fn stats(&self) -> LedgerStats {
        self.ledger.stats()
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> LedgerStats {
        self.ledger.stats_at(now)
    }

    pub fn model_info(&self) -> ModelInfo {
        let weights = self.weights.snapshot();
        ModelInfo {
            tracked_users: self.profiles.read().len(),
            ledger_len: self.ledger.len(),
            ledger_capacity: self.ledger.capacity(),
            weights: weights.as_map().clone(),
            max_weight: weights.max_weight(),
            reports_applied: self.reports_applied.load(Ordering::Relaxed),
        }
    }
}
