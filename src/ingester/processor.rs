//! Per-item classification pipeline
//!
//! Each article goes through dedup, the result cache, the quality gate,
//! instrument resolution, a context check, price and technicals, the
//! classifier and calibration. A signal is persisted in one atomic commit
//! and only then handed to the distributor.
//!
//! Items are independent: a failure drops that item for this cycle and is
//! logged with its fingerprint and stage. Nothing is marked seen unless the
//! emission commit succeeded, so dropped items are retried next cycle.

use super::{dedup_batch, source_counts};
use crate::analysis::{hourly_change_label, TechnicalSnapshot};
use crate::client::{ClassificationContext, MarketData, NewsAnalyst};
use crate::config::Config;
use crate::error::{ErrorKind, Result};
use crate::notify::{Distributor, SignalMessage};
use crate::resolver::ResolverHandle;
use crate::storage::Store;
use crate::strategy::{calibrate, ContradictionDetector, WeightsHandle};
use crate::types::{ClassificationResult, NewsItem, Provenance, SignalRecord};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// Raw scores from here up to the banner threshold get a warning banner
const LOW_CONFIDENCE_FLOOR: u8 = 60;

/// Symbols summarised in the classifier's market context
const MARKET_CHANGE_SYMBOLS: [&str; 2] = ["BTCUSDT", "ETHUSDT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dedup,
    Cache,
    QualityGate,
    Resolve,
    ContextCheck,
    Price,
    Technicals,
    Classify,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Dedup => "dedup",
            Stage::Cache => "cache",
            Stage::QualityGate => "quality_gate",
            Stage::Resolve => "resolve",
            Stage::ContextCheck => "context_check",
            Stage::Price => "price",
            Stage::Technicals => "technicals",
            Stage::Classify => "classify",
            Stage::Persist => "persist",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    AlreadySeen,
    /// Turned away by the quality gate and cached as such
    Rejected { score: u8 },
    /// Cached result not worth re-emitting
    CachedSkip,
    /// `kind` is set when an error caused the drop
    Dropped {
        stage: Stage,
        reason: String,
        kind: Option<ErrorKind>,
    },
    Emitted { record: SignalRecord, delivered: usize },
}

/// Counters for one ingestion cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub already_seen: usize,
    pub rejected: usize,
    pub cached_skips: usize,
    pub dropped: usize,
    pub emitted: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::AlreadySeen => self.already_seen += 1,
            ItemOutcome::Rejected { .. } => self.rejected += 1,
            ItemOutcome::CachedSkip => self.cached_skips += 1,
            ItemOutcome::Dropped { .. } => self.dropped += 1,
            ItemOutcome::Emitted { .. } => self.emitted += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub quality_threshold: u8,
    pub cached_min_confidence: u8,
    pub low_confidence_banner_below: u8,
    pub verify_delay: Duration,
    pub candle_interval: String,
    pub candle_limit: usize,
}

impl ProcessorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quality_threshold: config.pipeline.quality_threshold,
            cached_min_confidence: config.pipeline.cached_min_confidence,
            low_confidence_banner_below: config.pipeline.low_confidence_banner_below,
            verify_delay: Duration::seconds(config.pipeline.verify_delay_secs),
            candle_interval: config.market.candle_interval.clone(),
            candle_limit: config.market.candle_limit,
        }
    }
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Why an item left the pipeline early
struct Halt {
    stage: Stage,
    reason: String,
    /// Set when an error rather than a routine decision caused the drop
    kind: Option<ErrorKind>,
}

impl Halt {
    fn routine(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
            kind: None,
        }
    }
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, Halt>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, Halt> {
        self.map_err(|e| Halt {
            stage,
            reason: e.to_string(),
            kind: Some(e.kind()),
        })
    }
}

pub struct NewsProcessor {
    store: Arc<dyn Store>,
    analyst: Arc<dyn NewsAnalyst>,
    market: Arc<dyn MarketData>,
    distributor: Arc<dyn Distributor>,
    resolver: Arc<ResolverHandle>,
    weights: Arc<WeightsHandle>,
    contradictions: ContradictionDetector,
    settings: ProcessorSettings,
}

impl NewsProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        analyst: Arc<dyn NewsAnalyst>,
        market: Arc<dyn MarketData>,
        distributor: Arc<dyn Distributor>,
        resolver: Arc<ResolverHandle>,
        weights: Arc<WeightsHandle>,
        contradictions: ContradictionDetector,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            store,
            analyst,
            market,
            distributor,
            resolver,
            weights,
            contradictions,
            settings,
        }
    }

    pub async fn process_batch(&self, items: Vec<NewsItem>) -> BatchReport {
        self.process_batch_at(items, Utc::now().trunc_subsecs(3)).await
    }

    /// Run a batch as of `now`. Items never affect each other's outcome.
    pub async fn process_batch_at(&self, items: Vec<NewsItem>, now: DateTime<Utc>) -> BatchReport {
        let mut report = BatchReport {
            fetched: items.len(),
            ..Default::default()
        };
        let counts = source_counts(&items);

        for item in dedup_batch(items) {
            let source_count = counts.get(&item.fingerprint).copied().unwrap_or(1);
            let outcome = self.process_item(&item, source_count, now).await;
            report.record(&outcome);
        }

        tracing::info!(
            "🗞️ Cycle done: {} fetched, {} seen, {} rejected, {} cached skips, {} dropped, {} emitted",
            report.fetched,
            report.already_seen,
            report.rejected,
            report.cached_skips,
            report.dropped,
            report.emitted
        );
        report
    }

    pub async fn process_item(
        &self,
        item: &NewsItem,
        source_count: u32,
        now: DateTime<Utc>,
    ) -> ItemOutcome {
        match self.run_pipeline(item, source_count, now).await {
            Ok(outcome) => outcome,
            Err(drop) => {
                if let Some(kind) = drop.kind {
                    tracing::warn!(
                        fingerprint = %item.fingerprint.short(),
                        stage = %drop.stage,
                        kind = ?kind,
                        "Dropped \"{}\": {}",
                        item.title,
                        drop.reason
                    );
                } else {
                    tracing::debug!(
                        fingerprint = %item.fingerprint.short(),
                        stage = %drop.stage,
                        "Dropped \"{}\": {}",
                        item.title,
                        drop.reason
                    );
                }
                ItemOutcome::Dropped {
                    stage: drop.stage,
                    reason: drop.reason,
                    kind: drop.kind,
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        item: &NewsItem,
        source_count: u32,
        now: DateTime<Utc>,
    ) -> std::result::Result<ItemOutcome, Halt> {
        let fingerprint = &item.fingerprint;

        match self.store.seen(fingerprint).await {
            Ok(true) => return Ok(ItemOutcome::AlreadySeen),
            Ok(false) => {}
            Err(e) => tracing::warn!(
                fingerprint = %fingerprint.short(),
                stage = %Stage::Dedup,
                kind = ?e.kind(),
                "Seen store unavailable, processing anyway: {}",
                e
            ),
        }

        // An unreadable cache must not lead to a second AI call
        if let Some(cached) = self.store.get(fingerprint).await.at(Stage::Cache)? {
            return self.replay_cached(item, cached, now).await;
        }

        let verdict = self
            .analyst
            .evaluate_quality(&item.title, &item.body, &item.source)
            .await
            .at(Stage::QualityGate)?;
        if !verdict.passes(self.settings.quality_threshold) {
            tracing::info!(
                fingerprint = %fingerprint.short(),
                stage = %Stage::QualityGate,
                "⏭️ Skipped \"{}\" ({}, score {}, {}): {}",
                item.title,
                item.source,
                verdict.score,
                verdict.category,
                verdict.reason
            );
            let score = verdict.score;
            self.store
                .put(&ClassificationResult::rejected(fingerprint.clone(), verdict, now))
                .await
                .at(Stage::Persist)?;
            return Ok(ItemOutcome::Rejected { score });
        }

        let resolver = self.resolver.current();
        let resolution = resolver
            .resolve(&item.title, &item.body, self.analyst.as_ref())
            .await
            .at(Stage::Resolve)?
            .ok_or_else(|| Halt::routine(Stage::Resolve, "no tradable instrument"))?;
        let symbol = resolution.symbol;

        if !resolver.is_consistent(&symbol, &item.title, &item.body) {
            return Err(Halt::routine(
                Stage::ContextCheck,
                format!("{} not referenced in headline or summary", symbol),
            ));
        }

        let price = self.market.current_price(&symbol).await.at(Stage::Price)?;
        let technicals = self.technicals(&symbol).await.at(Stage::Technicals)?;

        let ctx = ClassificationContext {
            title: item.title.clone(),
            summary: item.body.clone(),
            instrument: symbol.clone(),
            timestamp: now,
            source: item.source.clone(),
            market_change: market_change_summary(self.market.as_ref()).await,
            recent_activity: self.contradictions.has_recent_activity(&symbol, now).await,
            technicals,
        };
        let classification = self.analyst.classify(&ctx).await.at(Stage::Classify)?;

        let weights = self.weights.snapshot();
        let confidence = calibrate(
            &weights,
            classification.confidence,
            resolution.provenance,
            source_count,
            None,
        );

        let result = ClassificationResult {
            fingerprint: fingerprint.clone(),
            is_relevant: true,
            instrument: Some(symbol.clone()),
            direction: classification.direction,
            label: classification.label,
            confidence,
            raw_confidence: classification.confidence,
            rationale: classification.rationale,
            provenance: Some(resolution.provenance),
            source_count,
            quality: Some(verdict),
            created_at: now,
        };
        self.store.put(&result).await.at(Stage::Persist)?;

        self.emit(item, &result, &symbol, price, &technicals, now).await
    }

    /// A cached result whose emission never committed. Fresh price and
    /// technicals, the cached call.
    async fn replay_cached(
        &self,
        item: &NewsItem,
        cached: ClassificationResult,
        now: DateTime<Utc>,
    ) -> std::result::Result<ItemOutcome, Halt> {
        let symbol = match (&cached.instrument, cached.is_relevant) {
            (Some(symbol), true) if cached.confidence >= self.settings.cached_min_confidence => {
                symbol.clone()
            }
            _ => {
                tracing::debug!(
                    fingerprint = %item.fingerprint.short(),
                    stage = %Stage::Cache,
                    "Cached result not emitted (relevant: {}, confidence {})",
                    cached.is_relevant,
                    cached.confidence
                );
                return Ok(ItemOutcome::CachedSkip);
            }
        };

        let price = self.market.current_price(&symbol).await.at(Stage::Price)?;
        let technicals = self.technicals(&symbol).await.at(Stage::Technicals)?;
        self.emit(item, &cached, &symbol, price, &technicals, now).await
    }

    async fn technicals(&self, symbol: &str) -> Result<TechnicalSnapshot> {
        let candles = self
            .market
            .candles(symbol, &self.settings.candle_interval, self.settings.candle_limit)
            .await?;
        TechnicalSnapshot::from_candles(&candles)
    }

    async fn emit(
        &self,
        item: &NewsItem,
        result: &ClassificationResult,
        symbol: &str,
        price: Decimal,
        technicals: &TechnicalSnapshot,
        now: DateTime<Utc>,
    ) -> std::result::Result<ItemOutcome, Halt> {
        let contradiction = self
            .contradictions
            .has_contradiction(symbol, result.direction, now)
            .await;

        let record = SignalRecord {
            id: 0,
            fingerprint: item.fingerprint.clone(),
            instrument: symbol.to_string(),
            direction: result.direction,
            label: result.label.clone(),
            title: item.title.clone(),
            confidence: result.confidence,
            raw_confidence: result.raw_confidence,
            provenance: result.provenance.unwrap_or(Provenance::Inferred),
            source_count: result.source_count,
            timestamp: now,
            price_at_signal: price,
            price_after: None,
            percent_change: None,
            rsi: Some(technicals.rsi),
        };
        let stored = self
            .store
            .commit_emission(&record, now + self.settings.verify_delay)
            .await
            .at(Stage::Persist)?;

        let low_confidence = (LOW_CONFIDENCE_FLOOR..self.settings.low_confidence_banner_below)
            .contains(&result.raw_confidence);
        let message = SignalMessage {
            instrument: symbol,
            direction: result.direction,
            label: &result.label,
            title: &item.title,
            confidence: result.confidence,
            rationale: &result.rationale,
            link: &item.link,
            technicals,
            candle_interval: &self.settings.candle_interval,
            contradiction,
            low_confidence,
        }
        .render();

        let deliveries = self.distributor.deliver(&message).await;
        let delivered = deliveries.iter().filter(|d| d.is_ok()).count();
        if delivered < deliveries.len() {
            tracing::warn!(
                fingerprint = %item.fingerprint.short(),
                "Signal delivered to {}/{} recipients",
                delivered,
                deliveries.len()
            );
        }

        tracing::info!(
            "📤 {} {} ({}%, raw {}) from \"{}\"{}",
            stored.instrument,
            stored.direction,
            stored.confidence,
            stored.raw_confidence,
            item.title,
            if contradiction { " [conflicting]" } else { "" }
        );
        Ok(ItemOutcome::Emitted {
            record: stored,
            delivered,
        })
    }
}

/// One-hour BTC and ETH moves, e.g. `BTC: +0.4%, ETH: -1.2%`.
/// `Unavailable` when neither could be fetched.
pub async fn market_change_summary(market: &dyn MarketData) -> String {
    let mut parts = Vec::new();
    for symbol in MARKET_CHANGE_SYMBOLS {
        match market.candles(symbol, "1m", 61).await {
            Ok(candles) => parts.extend(hourly_change_label(symbol, &candles)),
            Err(e) => tracing::debug!("Market change for {} unavailable: {}", symbol, e),
        }
    }
    if parts.is_empty() {
        "Unavailable".to_string()
    } else {
        parts.join(", ")
    }
}
