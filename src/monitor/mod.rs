//! Signal performance reporting


use crate::error::Result;
use crate::notify::escape_html;
use crate::storage::{ResultCache, SignalLog};
use crate::types::{ClassificationResult, Direction, SignalRecord};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Signals at or above this confidence make the top list
pub const TOP_SIGNAL_MIN_CONFIDENCE: u8 = 70;
const TOP_SIGNAL_COUNT: usize = 3;
const OVERBOUGHT_RSI: f64 = 70.0;

/// Resolved-outcome stats for one slice of signals. A win is any rise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceStats {
    pub count: usize,
    pub wins: usize,
    pub total_change: Decimal,
}

impl PerformanceStats {
    fn add(&mut self, change: Decimal) {
        self.count += 1;
        self.total_change += change;
        if change > Decimal::ZERO {
            self.wins += 1;
        }
    }

    /// Percent, one decimal place
    pub fn win_rate(&self) -> Decimal {
        if self.count == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.wins) * Decimal::ONE_HUNDRED / Decimal::from(self.count))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Mean percent move, two decimal places
    pub fn avg_change(&self) -> Decimal {
        if self.count == 0 {
            return Decimal::ZERO;
        }
        (self.total_change / Decimal::from(self.count))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyReport {
    pub since: DateTime<Utc>,
    /// Every signal emitted in the period
    pub emitted: usize,
    pub by_direction: Vec<(Direction, PerformanceStats)>,
    /// Keyed by bucket floor (80 covers 80-89)
    pub by_confidence: BTreeMap<u8, PerformanceStats>,
    pub top_signals: Vec<SignalRecord>,
    pub overbought: Vec<String>,
    pub latest_rejected: Option<ClassificationResult>,
}

impl AccuracyReport {
    pub fn from_records(
        since: DateTime<Utc>,
        records: &[SignalRecord],
        latest_rejected: Option<ClassificationResult>,
    ) -> Self {
        let mut by_direction: Vec<(Direction, PerformanceStats)> = [Direction::Buy, Direction::Sell, Direction::Hold]
            .into_iter()
            .map(|d| (d, PerformanceStats::default()))
            .collect();
        let mut by_confidence: BTreeMap<u8, PerformanceStats> = BTreeMap::new();

        for record in records.iter().filter(|r| r.timestamp >= since) {
            let Some(change) = record.percent_change else {
                continue;
            };
            if let Some((_, stats)) = by_direction.iter_mut().find(|(d, _)| *d == record.direction) {
                stats.add(change);
            }
            by_confidence
                .entry(record.confidence / 10 * 10)
                .or_default()
                .add(change);
        }
        by_direction.retain(|(_, stats)| stats.count > 0);

        let mut top_signals: Vec<SignalRecord> = records
            .iter()
            .filter(|r| r.timestamp >= since && r.confidence >= TOP_SIGNAL_MIN_CONFIDENCE)
            .cloned()
            .collect();
        top_signals.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        top_signals.truncate(TOP_SIGNAL_COUNT);

        let mut overbought: Vec<String> = Vec::new();
        for record in records.iter().filter(|r| r.timestamp >= since) {
            if record.rsi.is_some_and(|rsi| rsi > OVERBOUGHT_RSI) && !overbought.contains(&record.instrument) {
                overbought.push(record.instrument.clone());
            }
        }

        Self {
            since,
            emitted: records.iter().filter(|r| r.timestamp >= since).count(),
            by_direction,
            by_confidence,
            top_signals,
            overbought,
            latest_rejected: latest_rejected.filter(|r| r.created_at >= since),
        }
    }

    pub fn resolved(&self) -> usize {
        self.by_direction.iter().map(|(_, s)| s.count).sum()
    }

    /// HTML summary for Telegram
    pub fn render(&self) -> String {
        let mut lines = vec![format!(
            "📊 <b>Signal Report since {}</b>",
            self.since.format("%Y-%m-%d %H:%M UTC")
        )];
        lines.push(format!(
            "Signals emitted: {} ({} with outcome)",
            self.emitted,
            self.resolved()
        ));

        if !self.by_direction.is_empty() {
            lines.push(String::new());
            for (direction, stats) in &self.by_direction {
                lines.push(format!(
                    "🔹 {}: {} signals | {:.1}% win rate | Avg move: {:.2}%",
                    direction,
                    stats.count,
                    stats.win_rate(),
                    stats.avg_change()
                ));
            }

            lines.push(String::new());
            lines.push("🔸 Confidence buckets:".to_string());
            for (floor, stats) in self.by_confidence.iter().rev() {
                let top = (floor + 9).min(100);
                let range = if top == *floor {
                    format!("{}%", floor)
                } else {
                    format!("{}-{}%", floor, top)
                };
                lines.push(format!(
                    "   {} → {} signals | {:.1}% win rate",
                    range,
                    stats.count,
                    stats.win_rate()
                ));
            }
        }

        lines.push(String::new());
        if self.top_signals.is_empty() {
            lines.push("🧠 <b>Top Signals:</b> No strong signals.".to_string());
        } else {
            lines.push("🧠 <b>Top Signals:</b>".to_string());
            for s in &self.top_signals {
                let title: String = s.title.chars().take(100).collect();
                lines.push(format!(
                    "- {}: {} ({}%) {}",
                    s.instrument,
                    s.direction,
                    s.confidence,
                    escape_html(&title)
                ));
            }
        }

        if !self.overbought.is_empty() {
            lines.push(format!("🔍 RSI overbought: {}", self.overbought.join(", ")));
        }

        if let Some(rejected) = &self.latest_rejected {
            let (score, category) = rejected
                .quality
                .as_ref()
                .map(|q| (q.score, q.category.as_str()))
                .unwrap_or((0, "unknown"));
            lines.push(String::new());
            lines.push("🛑 <b>Most recent skipped news:</b>".to_string());
            lines.push(format!(
                "- {} (score {}): {}",
                escape_html(category),
                score,
                escape_html(&rejected.rationale)
            ));
        }

        lines.push(String::new());
        lines.push("📌 All signals are AI-generated. Not financial advice.".to_string());
        lines.join("\n")
    }
}

/// Builds reports from the signal log and result cache
pub struct Monitor {
    log: Arc<dyn SignalLog>,
    cache: Arc<dyn ResultCache>,
}

impl Monitor {
    pub fn new(log: Arc<dyn SignalLog>, cache: Arc<dyn ResultCache>) -> Self {
        Self { log, cache }
    }

    pub async fn report(&self, since: DateTime<Utc>) -> Result<AccuracyReport> {
        let records = self.log.signals_since(since).await?;
        let rejected = match self.cache.latest_rejected().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipped-news lookup failed: {}", e);
                None
            }
        };
        Ok(AccuracyReport::from_records(since, &records, rejected))
    }

    pub async fn log_stats(&self, since: DateTime<Utc>) -> Result<AccuracyReport> {
        let report = self.report(since).await?;
        let (wins, resolved) = report
            .by_direction
            .iter()
            .fold((0, 0), |(w, c), (_, s)| (w + s.wins, c + s.count));
        tracing::info!(
            "Performance: {} signals, {} resolved, {} wins",
            report.emitted,
            resolved,
            wins
        );
        Ok(report)
    }
}
