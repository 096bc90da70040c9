//! External collaborators
//!
//! - [`NewsAnalyst`]: AI quality gate, classifier and instrument guesser
//! - [`MarketData`]: prices, candles and the tradable universe

pub mod binance;
pub mod llm;

#[cfg(test)]
mod tests;

pub use binance::BinanceFutures;
pub use llm::LlmAnalyst;

use crate::analysis::TechnicalSnapshot;
use crate::error::Result;
use crate::types::{Candle, Classification, QualityVerdict};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Everything the classifier sees about one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationContext {
    pub title: String,
    pub summary: String,
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    /// e.g. `BTC: +0.4%, ETH: -1.2%`
    pub market_change: String,
    /// Signals for this instrument were emitted within the contradiction window
    pub recent_activity: bool,
    pub technicals: TechnicalSnapshot,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsAnalyst: Send + Sync {
    async fn evaluate_quality(
        &self,
        title: &str,
        summary: &str,
        source: &str,
    ) -> Result<QualityVerdict>;

    async fn classify(&self, ctx: &ClassificationContext) -> Result<Classification>;

    /// One candidate symbol, or `None` when the analyst is unsure
    async fn guess_instrument(&self, title: &str, summary: &str) -> Result<Option<String>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn current_price(&self, symbol: &str) -> Result<Decimal>;

    /// Bars oldest first
    async fn candles(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>>;

    /// Every tradable perpetual symbol
    async fn perpetual_symbols(&self) -> Result<Vec<String>>;

    /// Most liquid symbols by 24h quote volume, best first
    async fn top_volume_symbols(&self, limit: usize) -> Result<Vec<String>>;
}
