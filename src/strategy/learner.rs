//! Learned penalty weights
//!
//! Looks at how inferred-instrument signals actually played out and scales
//! their penalty: the better they do, the smaller the penalty.

use super::calibration::WeightsHandle;
use crate::error::Result;
use crate::storage::{SignalLog, WeightStore};
use crate::types::{PenaltyWeights, Provenance, SignalRecord};
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GroupStats {
    pub count: usize,
    pub wins: usize,
}

impl GroupStats {
    /// Percent of signals followed by a price rise
    pub fn win_rate(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.wins as f64 * 100.0 / self.count as f64)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LearnStats {
    pub exact: GroupStats,
    pub inferred: GroupStats,
}

pub fn collect_stats(records: &[SignalRecord]) -> LearnStats {
    let mut stats = LearnStats::default();
    for record in records {
        let Some(change) = record.percent_change else {
            continue;
        };
        let group = match record.provenance {
            Provenance::ExactMatch => &mut stats.exact,
            Provenance::Inferred => &mut stats.inferred,
        };
        group.count += 1;
        if change > Decimal::ZERO {
            group.wins += 1;
        }
    }
    stats
}

/// Step table from inferred win rate to inferred-instrument penalty
pub fn penalty_for_win_rate(win_rate: f64) -> u32 {
    if win_rate >= 70.0 {
        5
    } else if win_rate >= 60.0 {
        10
    } else if win_rate >= 50.0 {
        15
    } else {
        20
    }
}

/// New weight set from resolved records. Only the inferred penalty is
/// learned; the rest come from `defaults`.
pub fn learn_weights(records: &[SignalRecord], defaults: PenaltyWeights) -> (PenaltyWeights, LearnStats) {
    let stats = collect_stats(records);
    let weights = match stats.inferred.win_rate() {
        Some(rate) => PenaltyWeights {
            inferred_instrument: penalty_for_win_rate(rate),
            ..defaults
        },
        None => defaults,
    };
    (weights, stats)
}

pub struct WeightLearner {
    log: Arc<dyn SignalLog>,
    store: Arc<dyn WeightStore>,
    handle: Arc<WeightsHandle>,
    defaults: PenaltyWeights,
    window: usize,
}

impl WeightLearner {
    pub fn new(
        log: Arc<dyn SignalLog>,
        store: Arc<dyn WeightStore>,
        handle: Arc<WeightsHandle>,
        defaults: PenaltyWeights,
        window: usize,
    ) -> Self {
        Self {
            log,
            store,
            handle,
            defaults,
            window,
        }
    }

    /// Recompute, persist, then swap in the new weights. Stored
    /// confidences are left alone.
    pub async fn run_once(&self) -> Result<PenaltyWeights> {
        let records = self.log.recent_resolved(self.window).await?;
        let (weights, stats) = learn_weights(&records, self.defaults);

        self.store.save_weights(&weights).await?;
        self.handle.swap(weights);

        tracing::info!(
            "🧠 Weights learned from {} signals: inferred {}/{} wins, exact {}/{} wins → inferred penalty {}",
            records.len(),
            stats.inferred.wins,
            stats.inferred.count,
            stats.exact.wins,
            stats.exact.count,
            weights.inferred_instrument
        );
        Ok(weights)
    }
}
