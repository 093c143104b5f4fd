//! Rolling ledger of scored transactions
//!
//! A fixed-capacity ring buffer: appends are serialized behind the write
//! lock, reads take the read lock and copy out what they need. Once full,
//! every append evicts the oldest entry.

use crate::decision::Status;
use crate::ScoredTransaction;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier assigned to a transaction when it enters the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One retained transaction
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: TransactionId,
    /// Arrival order, strictly increasing across appends
    pub sequence: u64,
    pub transaction: Arc<ScoredTransaction>,
}

impl LedgerEntry {
    pub fn summary(&self) -> TransactionSummary {
        let request = &self.transaction.request;
        TransactionSummary {
            id: self.id,
            amount: request.amount,
            merchant: request
                .merchant
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            timestamp: request.timestamp,
            risk_score: self.transaction.risk_score,
            status: self.transaction.status,
        }
    }
}

/// Dashboard row for a recent transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub id: TransactionId,
    pub amount: f64,
    pub merchant: String,
    pub timestamp: DateTime<Utc>,
    pub risk_score: u8,
    pub status: Status,
}

/// Aggregates over the retained transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub count: usize,
    /// Entries submitted on the same UTC date as the reference instant
    pub today_count: usize,
    pub blocked_count: usize,
    pub average_score: f64,
}

#[derive(Debug)]
struct LedgerState {
    entries: VecDeque<LedgerEntry>,
    next_sequence: u64,
}

/// Bounded, thread-safe transaction ledger
#[derive(Debug)]
pub struct TransactionLedger {
    state: RwLock<LedgerState>,
    capacity: usize,
}

impl TransactionLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: RwLock::new(LedgerState {
                entries: VecDeque::with_capacity(capacity),
                next_sequence: 0,
            }),
            capacity,
        }
    }

    /// Append a scored transaction, evicting the oldest entry when full
    pub fn append(&self, transaction: ScoredTransaction) -> TransactionId {
        let id = TransactionId::new();
        let mut state = self.state.write();

        let sequence = state.next_sequence;
        state.next_sequence += 1;

        while state.entries.len() >= self.capacity {
            if let Some(evicted) = state.entries.pop_front() {
                log::debug!("Ledger full, evicting transaction {}", evicted.id);
            }
        }
        state.entries.push_back(LedgerEntry {
            id,
            sequence,
            transaction: Arc::new(transaction),
        });

        id
    }

    /// Up to `k` entries, most recent first
    pub fn recent(&self, k: usize) -> Vec<LedgerEntry> {
        let state = self.state.read();
        state.entries.iter().rev().take(k).cloned().collect()
    }

    /// Dashboard rows for up to `k` entries, most recent first
    pub fn recent_summaries(&self, k: usize) -> Vec<TransactionSummary> {
        let state = self.state.read();
        state
            .entries
            .iter()
            .rev()
            .take(k)
            .map(LedgerEntry::summary)
            .collect()
    }

    pub fn get(&self, id: TransactionId) -> Option<LedgerEntry> {
        let state = self.state.read();
        state.entries.iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Aggregate statistics relative to the current time
    pub fn stats(&self) -> LedgerStats {
        self.stats_at(Utc::now())
    }

    /// Aggregate statistics relative to `now`
    pub fn stats_at(&self, now: DateTime<Utc>) -> LedgerStats {
        let state = self.state.read();
        let today = now.date_naive();

        let count = state.entries.len();
        let mut today_count = 0;
        let mut blocked_count = 0;
        let mut score_total = 0u64;

        for entry in &state.entries {
            let tx = &entry.transaction;
            if tx.request.timestamp.date_naive() == today {
                today_count += 1;
            }
            if tx.status == Status::Blocked {
                blocked_count += 1;
            }
            score_total += tx.risk_score as u64;
        }

        let average_score = if count == 0 {
            0.0
        } else {
            score_total as f64 / count as f64
        };

        LedgerStats {
            count,
            today_count,
            blocked_count,
            average_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;
    use crate::TransactionRequest;
    use chrono::{Duration, TimeZone};
    use std::collections::{BTreeMap, HashSet};
    use std::thread;

    fn create_scored(amount: f64, risk_score: u8) -> ScoredTransaction {
        ScoredTransaction {
            request: TransactionRequest {
                user_id: "sarah123".to_string(),
                amount,
                device: "iPhone".to_string(),
                typing_speed: 80,
                timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap(),
                merchant: Some("Starbucks".to_string()),
            },
            risk_score,
            status: Status::from_score(risk_score),
            reasons: Vec::new(),
            contributions: Feature::ALL.iter().map(|f| (*f, 0)).collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_append_and_recent_order() {
        let ledger = TransactionLedger::new(10);
        for i in 0..3 {
            ledger.append(create_scored(i as f64, 0));
        }

        let recent = ledger.recent(10);
        let amounts: Vec<f64> = recent.iter().map(|e| e.transaction.request.amount).collect();
        assert_eq!(amounts, vec![2.0, 1.0, 0.0]);
        assert_eq!(ledger.recent(2).len(), 2);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let ledger = TransactionLedger::new(3);
        let ids: Vec<TransactionId> = (0..5).map(|i| ledger.append(create_scored(i as f64, 0))).collect();

        assert_eq!(ledger.len(), 3);
        assert!(ledger.get(ids[0]).is_none());
        assert!(ledger.get(ids[1]).is_none());
        let amounts: Vec<f64> = ledger
            .recent(3)
            .iter()
            .map(|e| e.transaction.request.amount)
            .collect();
        assert_eq!(amounts, vec![4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_get_by_id() {
        let ledger = TransactionLedger::new(3);
        let id = ledger.append(create_scored(42.0, 10));

        let entry = ledger.get(id).unwrap();
        assert_eq!(entry.transaction.request.amount, 42.0);
        assert!(ledger.get(TransactionId::new()).is_none());
    }

    #[test]
    fn test_stats() {
        let ledger = TransactionLedger::new(10);
        ledger.append(create_scored(10.0, 10));
        ledger.append(create_scored(20.0, 50));
        ledger.append(create_scored(30.0, 90));

        let mut yesterday = create_scored(40.0, 80);
        yesterday.request.timestamp = yesterday.request.timestamp - Duration::days(1);
        ledger.append(yesterday);

        let stats = ledger.stats_at(Utc.with_ymd_and_hms(2024, 1, 15, 23, 0, 0).unwrap());
        assert_eq!(stats.count, 4);
        assert_eq!(stats.today_count, 3);
        assert_eq!(stats.blocked_count, 2);
        assert_eq!(stats.average_score, 57.5);
    }

    #[test]
    fn test_empty_stats() {
        let stats = TransactionLedger::new(5).stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.average_score, 0.0);
    }

    #[test]
    fn test_summary_defaults_merchant() {
        let ledger = TransactionLedger::new(5);
        let mut scored = create_scored(12.5, 75);
        scored.request.merchant = None;
        let id = ledger.append(scored);

        let summary = &ledger.recent_summaries(1)[0];
        assert_eq!(summary.id, id);
        assert_eq!(summary.merchant, "Unknown");
        assert_eq!(summary.status, Status::Blocked);
        assert_eq!(summary.risk_score, 75);
    }

    #[test]
    fn test_transaction_id_parse() {
        let id = TransactionId::new();
        let parsed: TransactionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("tx_12345".parse::<TransactionId>().is_err());
    }

    #[test]
    fn test_concurrent_appends_respect_capacity() {
        let ledger = Arc::new(TransactionLedger::new(50));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for i in 0..40 {
                        ledger.append(create_scored((t * 100 + i) as f64, 0));
                        let _ = ledger.stats();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = ledger.recent(usize::MAX);
        assert_eq!(entries.len(), 50);

        let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
        let expected: Vec<u64> = (270..320).rev().collect();
        assert_eq!(sequences, expected);

        let unique: HashSet<TransactionId> = entries.iter().map(|e| e.id).collect();
        assert_eq!(unique.len(), 50);
    }
}
