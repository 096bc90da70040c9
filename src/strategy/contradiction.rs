//! Conflicting-signal detection
//!
//! Looks back over the signal log for the same instrument. A proposed call
//! is contradictory when the window already holds a different direction.

use crate::storage::SignalLog;
use crate::types::Direction;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

pub struct ContradictionDetector {
    log: Arc<dyn SignalLog>,
    window: Duration,
}

impl ContradictionDetector {
    pub fn new(log: Arc<dyn SignalLog>, window_mins: i64) -> Self {
        Self {
            log,
            window: Duration::minutes(window_mins),
        }
    }

    /// Distinct directions emitted for `instrument` in `[now - window, now]`.
    /// `None` when the log could not be read.
    pub async fn recent_directions(
        &self,
        instrument: &str,
        now: DateTime<Utc>,
    ) -> Option<HashSet<Direction>> {
        match self
            .log
            .signals_for_instrument(instrument, now - self.window, now)
            .await
        {
            Ok(records) => Some(records.iter().map(|r| r.direction).collect()),
            Err(e) => {
                tracing::warn!("Signal history unavailable for {}: {}", instrument, e);
                None
            }
        }
    }

    /// Fails open: an unreadable log reports no contradiction.
    pub async fn has_contradiction(
        &self,
        instrument: &str,
        proposed: Direction,
        now: DateTime<Utc>,
    ) -> bool {
        match self.recent_directions(instrument, now).await {
            Some(mut directions) => {
                directions.insert(proposed);
                directions.len() > 1
            }
            None => false,
        }
    }

    /// Any signal for `instrument` inside the window
    pub async fn has_recent_activity(&self, instrument: &str, now: DateTime<Utc>) -> bool {
        self.recent_directions(instrument, now)
            .await
            .map(|d| !d.is_empty())
            .unwrap_or(false)
    }
}
