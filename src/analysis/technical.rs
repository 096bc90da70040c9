//! Indicator snapshot over a window of OHLCV bars

use crate::error::{BotError, Result};
use crate::types::Candle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bars required before any indicator is computed
pub const MIN_BARS: usize = 50;
pub const RSI_PERIOD: usize = 14;
const MA_FAST: usize = 20;
const MA_SLOW: usize = 50;
const VOLUME_PERIOD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiLabel {
    Oversold,
    Neutral,
    Overbought,
}

impl RsiLabel {
    pub fn from_rsi(rsi: f64) -> Self {
        if rsi < 30.0 {
            RsiLabel::Oversold
        } else if rsi > 70.0 {
            RsiLabel::Overbought
        } else {
            RsiLabel::Neutral
        }
    }
}

impl fmt::Display for RsiLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RsiLabel::Oversold => "Oversold",
            RsiLabel::Neutral => "Neutral",
            RsiLabel::Overbought => "Overbought",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiTrend {
    Rising,
    Falling,
}

impl fmt::Display for RsiTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RsiTrend::Rising => "Rising",
            RsiTrend::Falling => "Falling",
        })
    }
}

/// Fast (20) versus slow (50) simple moving average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaCrossover {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for MaCrossover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MaCrossover::Bullish => "20 > 50 (Bullish)",
            MaCrossover::Bearish => "20 < 50 (Bearish)",
            MaCrossover::Neutral => "20 = 50 (Neutral)",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeLevel {
    High,
    Medium,
    Low,
}

impl VolumeLevel {
    pub fn from_ratio(ratio_pct: f64) -> Self {
        if ratio_pct > 180.0 {
            VolumeLevel::High
        } else if ratio_pct > 130.0 {
            VolumeLevel::Medium
        } else {
            VolumeLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VolumeSpike {
    /// Average volume was zero
    Unknown,
    Ratio { percent: f64, level: VolumeLevel },
}

impl fmt::Display for VolumeSpike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeSpike::Unknown => f.write_str("Unknown"),
            VolumeSpike::Ratio { percent, level } => {
                write!(f, "+{:.0}% vs avg ({:?})", percent, level)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    /// RSI rounded to one decimal place
    pub rsi: f64,
    pub rsi_label: RsiLabel,
    pub rsi_trend: RsiTrend,
    pub ma_crossover: MaCrossover,
    pub volume_spike: VolumeSpike,
}

impl TechnicalSnapshot {
    pub fn from_candles(candles: &[Candle]) -> Result<Self> {
        if candles.len() < MIN_BARS {
            return Err(BotError::InsufficientData {
                required: MIN_BARS,
                actual: candles.len(),
            });
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

        let series = rsi_series(&closes, RSI_PERIOD);
        let (prev, now) = match series.as_slice() {
            [.., prev, now] => (*prev, *now),
            _ => {
                return Err(BotError::InsufficientData {
                    required: RSI_PERIOD + 2,
                    actual: closes.len(),
                })
            }
        };
        let rsi = (now * 10.0).round() / 10.0;

        Ok(Self {
            rsi,
            rsi_label: RsiLabel::from_rsi(rsi),
            rsi_trend: if now > prev { RsiTrend::Rising } else { RsiTrend::Falling },
            ma_crossover: ma_crossover(&closes),
            volume_spike: volume_spike(&volumes),
        })
    }
}

/// Wilder-smoothed RSI for every bar after the seed window.
///
/// The first value averages the first `period` deltas; each later value
/// smooths as `avg = (avg * (period - 1) + x) / period`.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let p = period as f64;

    let mut avg_gain = deltas[..period].iter().map(|d| d.max(0.0)).sum::<f64>() / p;
    let mut avg_loss = deltas[..period].iter().map(|d| (-d).max(0.0)).sum::<f64>() / p;

    let mut out = Vec::with_capacity(deltas.len() - period + 1);
    out.push(rsi_value(avg_gain, avg_loss));

    for d in &deltas[period..] {
        avg_gain = (avg_gain * (p - 1.0) + d.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-d).max(0.0)) / p;
        out.push(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // a flat window has no direction
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

fn sma_tail(values: &[f64], period: usize) -> f64 {
    let tail = &values[values.len() - period..];
    tail.iter().sum::<f64>() / period as f64
}

fn ma_crossover(closes: &[f64]) -> MaCrossover {
    let fast = sma_tail(closes, MA_FAST);
    let slow = sma_tail(closes, MA_SLOW);
    if fast > slow {
        MaCrossover::Bullish
    } else if fast < slow {
        MaCrossover::Bearish
    } else {
        MaCrossover::Neutral
    }
}

/// Latest bar against the 20-bar average that includes it
fn volume_spike(volumes: &[f64]) -> VolumeSpike {
    let avg = sma_tail(volumes, VOLUME_PERIOD);
    let last = volumes[volumes.len() - 1];
    if avg == 0.0 {
        return VolumeSpike::Unknown;
    }
    let percent = last / avg * 100.0;
    VolumeSpike::Ratio {
        percent,
        level: VolumeLevel::from_ratio(percent),
    }
}

/// One-hour change line such as `BTC: +1.2%`, from 1m bars oldest first.
pub fn hourly_change_label(symbol: &str, candles: &[Candle]) -> Option<String> {
    if candles.len() < 2 {
        return None;
    }
    let then = candles[0].close;
    let now = candles[candles.len() - 1].close;
    if then == 0.0 {
        return None;
    }
    let pct = (now - then) / then * 100.0;
    let base = symbol.strip_suffix("USDT").unwrap_or(symbol);
    Some(format!("{}: {:+.1}%", base, pct))
}
