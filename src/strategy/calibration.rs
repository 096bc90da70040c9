//! Confidence calibration
//!
//! Penalties are subtracted from the classifier's raw confidence and the
//! result is clamped to `[MIN_CONFIDENCE, MAX_CONFIDENCE]`.

use crate::types::{PenaltyWeights, Provenance};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub const MIN_CONFIDENCE: u8 = 35;
pub const MAX_CONFIDENCE: u8 = 100;

/// Absolute move (percent) below which the market is considered not to
/// have reacted
pub const NO_MOVE_THRESHOLD: Decimal = dec!(0.3);

/// Calibrated confidence for one signal.
///
/// `realized_change` is the verified percent move and is `None` at emission.
/// The no-move penalty also applies to any negative move, whatever the
/// signal's direction; SELL calls that were right still lose points.
// TODO: make the no-move penalty direction-aware once enough SELL outcomes
// exist to compare both rules.
pub fn calibrate(
    weights: &PenaltyWeights,
    raw_confidence: u8,
    provenance: Provenance,
    source_count: u32,
    realized_change: Option<Decimal>,
) -> u8 {
    let mut score = raw_confidence as i64;

    if provenance == Provenance::Inferred {
        score -= weights.inferred_instrument as i64;
    }
    if source_count <= 1 {
        score -= weights.single_source as i64;
    }
    if let Some(change) = realized_change {
        if change.abs() < NO_MOVE_THRESHOLD || change < Decimal::ZERO {
            score -= weights.no_move as i64;
        }
    }

    score.clamp(MIN_CONFIDENCE as i64, MAX_CONFIDENCE as i64) as u8
}

/// Current penalty set, readable from any task and replaced in one step.
pub struct WeightsHandle {
    current: RwLock<Arc<PenaltyWeights>>,
}

impl WeightsHandle {
    pub fn new(weights: PenaltyWeights) -> Self {
        Self {
            current: RwLock::new(Arc::new(weights)),
        }
    }

    /// Consistent snapshot; later swaps don't affect it
    pub fn snapshot(&self) -> Arc<PenaltyWeights> {
        self.current.read().clone()
    }

    pub fn swap(&self, weights: PenaltyWeights) -> Arc<PenaltyWeights> {
        std::mem::replace(&mut *self.current.write(), Arc::new(weights))
    }
}
