//! Feedback learning from confirmed fraud reports
//!
//! The live weight table sits behind a `RwLock<Arc<WeightTable>>`. Scoring
//! clones the `Arc` and works from that snapshot; the learner builds a
//! complete replacement table and swaps it in under the write lock, so a
//! reader only ever sees a whole table.
//!
//! Weights only ever increase. There is no decay or negative feedback;
//! [`WeightCell::reset`] is the way back to the configured defaults.

use crate::features::Feature;
use crate::scoring::WeightTable;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared, atomically replaced weight table
#[derive(Debug)]
pub struct WeightCell {
    current: RwLock<Arc<WeightTable>>,
}

impl WeightCell {
    pub fn new(table: WeightTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
        }
    }

    /// Snapshot of the current table
    pub fn snapshot(&self) -> Arc<WeightTable> {
        self.current.read().clone()
    }

    /// Apply `update` to the current table and publish the result.
    ///
    /// `on_publish` runs while the write lock is still held, so successive
    /// calls observe tables in publication order.
    pub fn update<F, P>(&self, update: F, on_publish: P) -> Arc<WeightTable>
    where
        F: FnOnce(&WeightTable) -> WeightTable,
        P: FnOnce(&Arc<WeightTable>),
    {
        let mut guard = self.current.write();
        let next = Arc::new(update(&**guard));
        *guard = Arc::clone(&next);
        on_publish(&next);
        next
    }

    /// Replace the table outright
    pub fn reset<P>(&self, table: WeightTable, on_publish: P) -> Arc<WeightTable>
    where
        P: FnOnce(&Arc<WeightTable>),
    {
        self.update(|_| table, on_publish)
    }
}

/// Bounded reinforcement rule
#[derive(Debug, Clone)]
pub struct FeedbackLearner {
    learning_rate: f64,
}

impl FeedbackLearner {
    pub fn new(learning_rate: f64) -> Self {
        let learning_rate = if learning_rate.is_finite() {
            learning_rate.max(0.0)
        } else {
            0.0
        };
        Self { learning_rate }
    }

    /// Raise the weight of every feature that contributed to a fraudulent
    /// transaction, clamped to the table's ceiling
    pub fn reinforce<P>(
        &self,
        weights: &WeightCell,
        contributions: &BTreeMap<Feature, u32>,
        on_publish: P,
    ) -> Arc<WeightTable>
    where
        P: FnOnce(&Arc<WeightTable>),
    {
        let implicated: Vec<Feature> = contributions
            .iter()
            .filter(|(_, points)| **points > 0)
            .map(|(f, _)| *f)
            .collect();

        weights.update(
            |table| table.bumped(implicated.iter().copied(), self.learning_rate),
            on_publish,
        )
    }
}
