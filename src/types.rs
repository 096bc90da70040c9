//! Core types shared across the pipeline

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable identity of a news item, derived only from its link and
/// publish timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_parts(link: &str, published: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(link.trim().as_bytes());
        hasher.update(b"|");
        hasher.update(published.trim().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already computed digest (e.g. read back from storage)
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single article pulled from a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub fingerprint: Fingerprint,
    pub title: String,
    pub body: String,
    pub source: String,
    pub link: String,
    pub published_raw: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        source: impl Into<String>,
        link: impl Into<String>,
        published_raw: impl Into<String>,
    ) -> Self {
        let link = link.into();
        let published_raw = published_raw.into();
        let published_at = DateTime::parse_from_rfc2822(published_raw.trim())
            .or_else(|_| DateTime::parse_from_rfc3339(published_raw.trim()))
            .ok()
            .map(|dt| dt.with_timezone(&Utc));

        Self {
            fingerprint: Fingerprint::from_parts(&link, &published_raw),
            title: title.into(),
            body: body.into(),
            source: source.into(),
            link,
            published_raw,
            published_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::Hold => "HOLD",
        }
    }

    /// Lenient parse of classifier output; anything unrecognised is HOLD.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "BUY" | "LONG" | "BULLISH" => Direction::Buy,
            "SELL" | "SHORT" | "BEARISH" => Direction::Sell,
            _ => Direction::Hold,
        }
    }

    pub fn default_label(&self) -> &'static str {
        match self {
            Direction::Buy => "🟢 Bullish",
            Direction::Sell => "🔴 Bearish",
            Direction::Hold => "⚪️ Neutral",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = crate::error::BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Direction::Buy),
            "SELL" => Ok(Direction::Sell),
            "HOLD" => Ok(Direction::Hold),
            other => Err(crate::error::BotError::Validation(format!(
                "unknown direction: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an instrument was attached to a news item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provenance {
    ExactMatch,
    Inferred,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::ExactMatch => "EXACT_MATCH",
            Provenance::Inferred => "INFERRED",
        }
    }
}

impl std::str::FromStr for Provenance {
    type Err = crate::error::BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXACT_MATCH" => Ok(Provenance::ExactMatch),
            "INFERRED" => Ok(Provenance::Inferred),
            other => Err(crate::error::BotError::Validation(format!(
                "unknown provenance: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub symbol: String,
    pub provenance: Provenance,
}

/// Output of the quality gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub include: bool,
    pub score: u8,
    pub category: String,
    pub reason: String,
}

impl QualityVerdict {
    pub fn passes(&self, threshold: u8) -> bool {
        self.include && self.score >= threshold
    }
}

/// Directional call returned by the classifier, before calibration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub direction: Direction,
    pub label: String,
    pub confidence: u8,
    pub rationale: String,
}

/// Cached outcome of processing one fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub fingerprint: Fingerprint,
    pub is_relevant: bool,
    pub instrument: Option<String>,
    pub direction: Direction,
    pub label: String,
    /// Calibrated confidence; the only field rewritten after creation
    pub confidence: u8,
    /// Classifier's own score, kept so recalibration never stacks penalties
    pub raw_confidence: u8,
    pub rationale: String,
    pub provenance: Option<Provenance>,
    pub source_count: u32,
    pub quality: Option<QualityVerdict>,
    pub created_at: DateTime<Utc>,
}

impl ClassificationResult {
    /// Cache entry for an item the quality gate turned away.
    pub fn rejected(fingerprint: Fingerprint, verdict: QualityVerdict, now: DateTime<Utc>) -> Self {
        Self {
            fingerprint,
            is_relevant: false,
            instrument: None,
            direction: Direction::Hold,
            label: Direction::Hold.default_label().to_string(),
            confidence: 0,
            raw_confidence: 0,
            rationale: verdict.reason.clone(),
            provenance: None,
            source_count: 0,
            quality: Some(verdict),
            created_at: now,
        }
    }
}

/// Append-only log entry for an emitted signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Storage row id; zero until persisted
    pub id: i64,
    pub fingerprint: Fingerprint,
    pub instrument: String,
    pub direction: Direction,
    pub label: String,
    pub title: String,
    pub confidence: u8,
    pub raw_confidence: u8,
    pub provenance: Provenance,
    pub source_count: u32,
    pub timestamp: DateTime<Utc>,
    pub price_at_signal: Decimal,
    pub price_after: Option<Decimal>,
    pub percent_change: Option<Decimal>,
    pub rsi: Option<f64>,
}

impl SignalRecord {
    pub fn is_resolved(&self) -> bool {
        self.percent_change.is_some()
    }
}

/// Deferred outcome check for one emitted signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingVerification {
    pub id: i64,
    pub instrument: String,
    pub signal_timestamp: DateTime<Utc>,
    pub price_at_signal: Decimal,
    pub check_after: DateTime<Utc>,
    pub attempts: u32,
}

/// Confidence penalties, in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyWeights {
    #[serde(default = "default_inferred_penalty")]
    pub inferred_instrument: u32,
    #[serde(default = "default_single_source_penalty")]
    pub single_source: u32,
    #[serde(default = "default_no_move_penalty")]
    pub no_move: u32,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            inferred_instrument: default_inferred_penalty(),
            single_source: default_single_source_penalty(),
            no_move: default_no_move_penalty(),
        }
    }
}

fn default_inferred_penalty() -> u32 {
    15
}

fn default_single_source_penalty() -> u32 {
    10
}

fn default_no_move_penalty() -> u32 {
    20
}

/// OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Percent move from `before` to `after`, rounded to two places.
pub fn percent_change(before: Decimal, after: Decimal) -> Option<Decimal> {
    if before.is_zero() {
        return None;
    }
    let pct = (after - before) / before * Decimal::ONE_HUNDRED;
    Some(pct.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}
