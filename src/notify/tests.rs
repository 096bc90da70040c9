//! Unit tests for notify module

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::analysis::{MaCrossover, RsiLabel, RsiTrend, TechnicalSnapshot, VolumeLevel, VolumeSpike};
    use crate::config::TelegramConfig;
    use crate::types::Direction;

    fn snapshot() -> TechnicalSnapshot {
        TechnicalSnapshot {
            rsi: 72.4,
            rsi_label: RsiLabel::Overbought,
            rsi_trend: RsiTrend::Rising,
            ma_crossover: MaCrossover::Bullish,
            volume_spike: VolumeSpike::Ratio {
                percent: 210.0,
                level: VolumeLevel::High,
            },
        }
    }

    fn message(technicals: &TechnicalSnapshot) -> SignalMessage<'_> {
        SignalMessage {
            instrument: "ETHUSDT",
            direction: Direction::Buy,
            label: "🟢 Bullish",
            title: "ETF <approval> odds rise & flows follow",
            confidence: 75,
            rationale: "Approval odds jumped",
            link: "https://example.com/eth?a=1&b=2",
            technicals,
            candle_interval: "5m",
            contradiction: false,
            low_confidence: false,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > \"d\""), "a &lt; b &amp;&amp; c &gt; \"d\"");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_render_body() {
        let t = snapshot();
        let text = message(&t).render();

        assert!(text.starts_with("📊 Signal from news for <b>ETHUSDT</b>: BUY\n"));
        assert!(text.contains("🟢 Bullish ETF &lt;approval&gt; odds rise &amp; flows follow"));
        assert!(text.contains("📈 Confidence: <b>75%</b>"));
        assert!(text.contains("🔁 RSI: 72.4 (Overbought, Rising)"));
        assert!(text.contains("📊 MA: 20 > 50 (Bullish)"));
        assert!(text.contains("🔊 Volume: +210% vs avg (High)"));
        assert!(text.contains("💬 Analyst: Approval odds jumped"));
        assert!(text.contains("(5m OHLCV)"));
        assert!(text.contains("🔗 https://example.com/eth?a=1&amp;b=2"));
        assert!(text.contains("https://www.tradingview.com/symbols/ETHUSDT/"));
    }

    #[test]
    fn test_render_banners_in_order() {
        let t = snapshot();
        let text = SignalMessage {
            contradiction: true,
            low_confidence: true,
            ..message(&t)
        }
        .render();

        let low = text.find("Low-Confidence").unwrap();
        let conflict = text
            .find("⚠️ <b>INDECISION</b>: Conflicting signals recently detected for <b>ETHUSDT</b>")
            .unwrap();
        let body = text.find("📊 Signal from news").unwrap();
        assert!(low < conflict && conflict < body);
    }

    #[tokio::test]
    async fn test_log_distributor_reports_one_delivery() {
        let deliveries = LogDistributor.deliver("hello").await;
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].is_ok());
    }

    #[tokio::test]
    async fn test_telegram_without_recipients_sends_nothing() {
        let notifier = TelegramNotifier::new(&TelegramConfig {
            bot_token: "token".to_string(),
            chat_ids: vec![],
        })
        .unwrap();
        assert!(notifier.deliver("hello").await.is_empty());
    }

    #[test]
    fn test_delivery_status() {
        let failed = Delivery {
            recipient: "42".to_string(),
            error: Some("chat not found".to_string()),
        };
        assert!(!failed.is_ok());
    }
}
