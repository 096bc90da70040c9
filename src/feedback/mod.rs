//! Outcome verification
//!
//! Some hours after a signal is emitted its instrument is priced again. The
//! percent move is written back to the log and the signal's confidence is
//! recalibrated from the classifier's raw score, so penalties never stack.

#[cfg(test)]
mod tests;

use crate::client::MarketData;
use crate::error::Result;
use crate::storage::{Store, VerificationUpdate};
use crate::strategy::{calibrate, WeightsHandle};
use crate::types::{percent_change, PendingVerification};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Counters for one verification pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub due: usize,
    pub resolved: usize,
    /// Price or commit failed; left queued for the next pass
    pub failed: usize,
    /// Nothing left to resolve; removed from the queue
    pub discarded: usize,
}

enum Verified {
    Resolved,
    Discarded,
}

pub struct OutcomeVerifier {
    store: Arc<dyn Store>,
    market: Arc<dyn MarketData>,
    weights: Arc<WeightsHandle>,
}

impl OutcomeVerifier {
    pub fn new(store: Arc<dyn Store>, market: Arc<dyn MarketData>, weights: Arc<WeightsHandle>) -> Self {
        Self {
            store,
            market,
            weights,
        }
    }

    /// Resolve every pending check due at `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<VerifyReport> {
        let due = self.store.due(now).await?;
        let mut report = VerifyReport {
            due: due.len(),
            ..Default::default()
        };

        for pending in &due {
            match self.verify(pending).await {
                Ok(Verified::Resolved) => report.resolved += 1,
                Ok(Verified::Discarded) => report.discarded += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        kind = ?e.kind(),
                        "Verification of {} @ {} failed (attempt {}): {}",
                        pending.instrument,
                        pending.signal_timestamp,
                        pending.attempts + 1,
                        e
                    );
                    if let Err(e) = self.store.record_failure(pending.id).await {
                        tracing::warn!("Could not record failed attempt for pending {}: {}", pending.id, e);
                    }
                }
            }
        }

        if report.due > 0 {
            tracing::info!(
                "🔍 Verification pass: {} due, {} resolved, {} failed, {} discarded",
                report.due,
                report.resolved,
                report.failed,
                report.discarded
            );
        }
        Ok(report)
    }

    async fn verify(&self, pending: &PendingVerification) -> Result<Verified> {
        let price_after = self.market.current_price(&pending.instrument).await?;

        let Some(record) = self
            .store
            .find_unresolved(&pending.instrument, pending.signal_timestamp)
            .await?
        else {
            tracing::warn!(
                "No unresolved signal for {} @ {}, dropping pending {}",
                pending.instrument,
                pending.signal_timestamp,
                pending.id
            );
            self.store.remove_pending(pending.id).await?;
            return Ok(Verified::Discarded);
        };

        let Some(change) = percent_change(record.price_at_signal, price_after) else {
            tracing::warn!(
                "Signal {} has no entry price, dropping pending {}",
                record.id,
                pending.id
            );
            self.store.remove_pending(pending.id).await?;
            return Ok(Verified::Discarded);
        };

        let weights = self.weights.snapshot();
        let confidence = calibrate(
            &weights,
            record.raw_confidence,
            record.provenance,
            record.source_count,
            Some(change),
        );

        self.store
            .commit_verification(&VerificationUpdate {
                pending_id: pending.id,
                record_id: record.id,
                fingerprint: record.fingerprint.clone(),
                price_after,
                percent_change: change,
                confidence,
            })
            .await?;

        tracing::info!(
            "✅ {} {}: {} → {} ({}%), confidence {} → {}",
            record.instrument,
            record.direction,
            record.price_at_signal,
            price_after,
            change,
            record.confidence,
            confidence
        );
        Ok(Verified::Resolved)
    }
}
