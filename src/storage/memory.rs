//! In-memory store for dry runs and tests

use super::{
    PendingQueue, ResultCache, SeenStore, SignalLog, Store, VerificationUpdate, WeightStore,
};
use crate::error::{BotError, Result};
use crate::types::{
    ClassificationResult, Fingerprint, PenaltyWeights, PendingVerification, SignalRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Operations that can be made to fail on purpose, to exercise outage paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Seen,
    CacheRead,
    SignalRead,
    Commit,
}

#[derive(Default)]
struct Inner {
    seen: HashSet<Fingerprint>,
    cache: HashMap<Fingerprint, ClassificationResult>,
    signals: Vec<SignalRecord>,
    pending: Vec<PendingVerification>,
    weights: Option<PenaltyWeights>,
    next_signal_id: i64,
    next_pending_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    faults: RwLock<HashSet<FaultPoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject_fault(&self, point: FaultPoint) {
        self.faults.write().insert(point);
    }

    pub fn clear_faults(&self) {
        self.faults.write().clear();
    }

    fn check(&self, point: FaultPoint) -> Result<()> {
        if self.faults.read().contains(&point) {
            return Err(BotError::StorageUnavailable(format!("{:?} unavailable", point)));
        }
        Ok(())
    }

    /// Snapshot of every stored record, oldest first
    pub fn all_signals(&self) -> Vec<SignalRecord> {
        self.inner.read().signals.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.read().pending.len()
    }

    /// Insert a record directly, bypassing the emission commit
    pub fn push_signal(&self, mut record: SignalRecord) -> SignalRecord {
        let mut inner = self.inner.write();
        inner.next_signal_id += 1;
        record.id = inner.next_signal_id;
        inner.signals.push(record.clone());
        record
    }
}

#[async_trait]
impl SeenStore for MemoryStore {
    async fn seen(&self, fingerprint: &Fingerprint) -> Result<bool> {
        self.check(FaultPoint::Seen)?;
        Ok(self.inner.read().seen.contains(fingerprint))
    }

    async fn mark_seen(&self, fingerprint: &Fingerprint) -> Result<()> {
        self.inner.write().seen.insert(fingerprint.clone());
        Ok(())
    }
}

#[async_trait]
impl ResultCache for MemoryStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<ClassificationResult>> {
        self.check(FaultPoint::CacheRead)?;
        Ok(self.inner.read().cache.get(fingerprint).cloned())
    }

    async fn put(&self, result: &ClassificationResult) -> Result<()> {
        self.inner
            .write()
            .cache
            .entry(result.fingerprint.clone())
            .or_insert_with(|| result.clone());
        Ok(())
    }

    async fn update_confidence(&self, fingerprint: &Fingerprint, confidence: u8) -> Result<()> {
        if let Some(entry) = self.inner.write().cache.get_mut(fingerprint) {
            entry.confidence = confidence;
        }
        Ok(())
    }

    async fn latest_rejected(&self) -> Result<Option<ClassificationResult>> {
        self.check(FaultPoint::CacheRead)?;
        Ok(self
            .inner
            .read()
            .cache
            .values()
            .filter(|r| !r.is_relevant)
            .max_by_key(|r| r.created_at)
            .cloned())
    }
}

#[async_trait]
impl SignalLog for MemoryStore {
    async fn signals_for_instrument(
        &self,
        instrument: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SignalRecord>> {
        self.check(FaultPoint::SignalRead)?;
        Ok(self
            .inner
            .read()
            .signals
            .iter()
            .filter(|s| s.instrument == instrument && s.timestamp >= since && s.timestamp <= until)
            .cloned()
            .collect())
    }

    async fn find_unresolved(
        &self,
        instrument: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<SignalRecord>> {
        self.check(FaultPoint::SignalRead)?;
        Ok(self
            .inner
            .read()
            .signals
            .iter()
            .find(|s| s.instrument == instrument && s.timestamp == timestamp && !s.is_resolved())
            .cloned())
    }

    async fn recent_resolved(&self, limit: usize) -> Result<Vec<SignalRecord>> {
        self.check(FaultPoint::SignalRead)?;
        let inner = self.inner.read();
        let mut resolved: Vec<_> = inner.signals.iter().filter(|s| s.is_resolved()).cloned().collect();
        resolved.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        resolved.truncate(limit);
        Ok(resolved)
    }

    async fn signals_since(&self, since: DateTime<Utc>) -> Result<Vec<SignalRecord>> {
        self.check(FaultPoint::SignalRead)?;
        Ok(self
            .inner
            .read()
            .signals
            .iter()
            .filter(|s| s.timestamp >= since)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PendingQueue for MemoryStore {
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<PendingVerification>> {
        Ok(self
            .inner
            .read()
            .pending
            .iter()
            .filter(|p| p.check_after <= now)
            .cloned()
            .collect())
    }

    async fn remove_pending(&self, id: i64) -> Result<()> {
        self.inner.write().pending.retain(|p| p.id != id);
        Ok(())
    }

    async fn record_failure(&self, id: i64) -> Result<()> {
        if let Some(p) = self.inner.write().pending.iter_mut().find(|p| p.id == id) {
            p.attempts += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl WeightStore for MemoryStore {
    async fn load_weights(&self) -> Result<Option<PenaltyWeights>> {
        Ok(self.inner.read().weights)
    }

    async fn save_weights(&self, weights: &PenaltyWeights) -> Result<()> {
        self.inner.write().weights = Some(*weights);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn commit_emission(
        &self,
        record: &SignalRecord,
        check_after: DateTime<Utc>,
    ) -> Result<SignalRecord> {
        self.check(FaultPoint::Commit)?;
        let mut inner = self.inner.write();

        inner.next_signal_id += 1;
        let mut stored = record.clone();
        stored.id = inner.next_signal_id;
        inner.signals.push(stored.clone());

        inner.next_pending_id += 1;
        let pending = PendingVerification {
            id: inner.next_pending_id,
            instrument: stored.instrument.clone(),
            signal_timestamp: stored.timestamp,
            price_at_signal: stored.price_at_signal,
            check_after,
            attempts: 0,
        };
        inner.pending.push(pending);
        inner.seen.insert(stored.fingerprint.clone());

        Ok(stored)
    }

    async fn commit_verification(&self, update: &VerificationUpdate) -> Result<()> {
        self.check(FaultPoint::Commit)?;
        let mut inner = self.inner.write();

        let record = inner
            .signals
            .iter_mut()
            .find(|s| s.id == update.record_id)
            .ok_or_else(|| BotError::Validation(format!("signal {} not found", update.record_id)))?;
        if record.is_resolved() {
            return Err(BotError::Validation(format!(
                "signal {} already resolved",
                update.record_id
            )));
        }
        record.price_after = Some(update.price_after);
        record.percent_change = Some(update.percent_change);
        record.confidence = update.confidence;

        if let Some(entry) = inner.cache.get_mut(&update.fingerprint) {
            entry.confidence = update.confidence;
        }
        inner.pending.retain(|p| p.id != update.pending_id);
        Ok(())
    }
}
