//! Persistent state
//!
//! The pipeline talks to storage through small traits so each component
//! depends only on what it reads or writes. [`Store`] ties them together and
//! adds the two multi-table commits that must be atomic.

pub mod memory;
pub mod sqlite;


pub use memory::{FaultPoint, MemoryStore};
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::{
    ClassificationResult, Fingerprint, PenaltyWeights, PendingVerification, SignalRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Fingerprints that have been fully handled.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SeenStore: Send + Sync {
    async fn seen(&self, fingerprint: &Fingerprint) -> Result<bool>;
    async fn mark_seen(&self, fingerprint: &Fingerprint) -> Result<()>;
}

/// Classification results keyed by fingerprint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<ClassificationResult>>;
    async fn put(&self, result: &ClassificationResult) -> Result<()>;
    async fn update_confidence(&self, fingerprint: &Fingerprint, confidence: u8) -> Result<()>;
    /// Most recent entry the quality gate turned away
    async fn latest_rejected(&self) -> Result<Option<ClassificationResult>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalLog: Send + Sync {
    /// Records for `instrument` with `since <= timestamp <= until`
    async fn signals_for_instrument(
        &self,
        instrument: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SignalRecord>>;

    /// First unresolved record for this instrument and timestamp, if any
    async fn find_unresolved(
        &self,
        instrument: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<SignalRecord>>;

    /// Latest `limit` records with a known outcome, newest first
    async fn recent_resolved(&self, limit: usize) -> Result<Vec<SignalRecord>>;

    /// All records emitted at or after `since`, oldest first
    async fn signals_since(&self, since: DateTime<Utc>) -> Result<Vec<SignalRecord>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PendingQueue: Send + Sync {
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<PendingVerification>>;
    async fn remove_pending(&self, id: i64) -> Result<()>;
    /// Bump the attempt counter after a failed price fetch
    async fn record_failure(&self, id: i64) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeightStore: Send + Sync {
    async fn load_weights(&self) -> Result<Option<PenaltyWeights>>;
    async fn save_weights(&self, weights: &PenaltyWeights) -> Result<()>;
}

/// Outcome of one verification, applied in a single transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationUpdate {
    pub pending_id: i64,
    pub record_id: i64,
    pub fingerprint: Fingerprint,
    pub price_after: Decimal,
    pub percent_change: Decimal,
    pub confidence: u8,
}

#[async_trait]
pub trait Store: SeenStore + ResultCache + SignalLog + PendingQueue + WeightStore {
    /// Append the signal, enqueue its verification and mark its
    /// fingerprint seen. Either all three happen or none do.
    /// Returns the stored record with its id assigned.
    async fn commit_emission(
        &self,
        record: &SignalRecord,
        check_after: DateTime<Utc>,
    ) -> Result<SignalRecord>;

    /// Fill in the outcome, overwrite the confidence (log and cache) and
    /// drop the pending entry.
    async fn commit_verification(&self, update: &VerificationUpdate) -> Result<()>;
}
