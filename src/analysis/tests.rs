//! Unit tests for analysis module

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::error::BotError;
    use crate::types::Candle;

    fn bars(closes: &[f64], volumes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&close, &volume))| Candle {
                open_time: i as i64 * 300_000,
                open: close,
                high: close,
                low: close,
                close,
                volume,
            })
            .collect()
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn test_insufficient_bars() {
        let candles = bars(&rising(49), &vec![1.0; 49]);
        match TechnicalSnapshot::from_candles(&candles) {
            Err(BotError::InsufficientData { required, actual }) => {
                assert_eq!(required, 50);
                assert_eq!(actual, 49);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_all_gains_rsi_is_100() {
        let candles = bars(&rising(50), &vec![1.0; 50]);
        let snap = TechnicalSnapshot::from_candles(&candles).unwrap();
        assert_eq!(snap.rsi, 100.0);
        assert_eq!(snap.rsi_label, RsiLabel::Overbought);
        assert_eq!(snap.ma_crossover, MaCrossover::Bullish);
    }

    #[test]
    fn test_all_losses_rsi_is_zero() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let candles = bars(&closes, &vec![1.0; 60]);
        let snap = TechnicalSnapshot::from_candles(&candles).unwrap();
        assert_eq!(snap.rsi, 0.0);
        assert_eq!(snap.rsi_label, RsiLabel::Oversold);
        assert_eq!(snap.ma_crossover, MaCrossover::Bearish);
        assert_eq!(snap.ma_crossover.to_string(), "20 < 50 (Bearish)");
    }

    #[test]
    fn test_flat_series_is_neutral() {
        let candles = bars(&vec![100.0; 50], &vec![0.0; 50]);
        let snap = TechnicalSnapshot::from_candles(&candles).unwrap();
        assert_eq!(snap.rsi, 50.0);
        assert_eq!(snap.rsi_label, RsiLabel::Neutral);
        assert_eq!(snap.rsi_trend, RsiTrend::Falling);
        assert_eq!(snap.ma_crossover.to_string(), "20 = 50 (Neutral)");
        assert_eq!(snap.volume_spike, VolumeSpike::Unknown);
        assert_eq!(snap.volume_spike.to_string(), "Unknown");
    }

    #[test]
    fn test_rsi_trend_rising_after_dip() {
        let mut closes: Vec<f64> = (0..48).map(|i| 100.0 + (i % 2) as f64).collect();
        closes.push(99.0);
        closes.push(103.0);
        let candles = bars(&closes, &vec![1.0; 50]);
        let snap = TechnicalSnapshot::from_candles(&candles).unwrap();
        assert_eq!(snap.rsi_trend, RsiTrend::Rising);
    }

    #[test]
    fn test_rsi_series_length() {
        let series = rsi_series(&rising(50), RSI_PERIOD);
        assert_eq!(series.len(), 50 - RSI_PERIOD);
        assert!(rsi_series(&rising(14), RSI_PERIOD).is_empty());
    }

    #[test]
    fn test_volume_spike_levels() {
        let mut volumes = vec![10.0; 50];
        volumes[49] = 48.0;
        // avg over last 20 = (19*10 + 48)/20 = 11.9 -> 403%
        let snap = TechnicalSnapshot::from_candles(&bars(&rising(50), &volumes)).unwrap();
        match snap.volume_spike {
            VolumeSpike::Ratio { level, .. } => assert_eq!(level, VolumeLevel::High),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(snap.volume_spike.to_string(), "+403% vs avg (High)");

        assert_eq!(VolumeLevel::from_ratio(150.0), VolumeLevel::Medium);
        assert_eq!(VolumeLevel::from_ratio(130.0), VolumeLevel::Low);
        assert_eq!(VolumeLevel::from_ratio(180.1), VolumeLevel::High);
    }

    #[test]
    fn test_hourly_change_label() {
        let candles = bars(&[100.0, 101.0, 102.5], &[1.0, 1.0, 1.0]);
        assert_eq!(
            hourly_change_label("BTCUSDT", &candles).as_deref(),
            Some("BTC: +2.5%")
        );
        assert!(hourly_change_label("BTCUSDT", &candles[..1]).is_none());
    }
}
