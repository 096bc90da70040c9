//! Market analysis
//!
//! Indicator snapshots attached to every emitted signal:
//! - RSI (Wilder, 14) with label and trend
//! - 20/50 moving average crossover
//! - Volume against its 20-bar average

pub mod technical;

#[cfg(test)]
mod tests;

pub use technical::{
    hourly_change_label, rsi_series, MaCrossover, RsiLabel, RsiTrend, TechnicalSnapshot,
    VolumeLevel, VolumeSpike, MIN_BARS, RSI_PERIOD,
};
