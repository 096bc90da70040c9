//! Telegram message layout for emitted signals

use crate::analysis::TechnicalSnapshot;
use crate::types::Direction;

/// Everything shown to subscribers for one signal.
#[derive(Debug, Clone)]
pub struct SignalMessage<'a> {
    pub instrument: &'a str,
    pub direction: Direction,
    pub label: &'a str,
    pub title: &'a str,
    pub confidence: u8,
    pub rationale: &'a str,
    pub link: &'a str,
    pub technicals: &'a TechnicalSnapshot,
    pub candle_interval: &'a str,
    /// Another direction was emitted for the instrument inside the window
    pub contradiction: bool,
    /// Classifier score was below the banner threshold
    pub low_confidence: bool,
}

impl SignalMessage<'_> {
    /// HTML body for Telegram's `parse_mode=HTML`
    pub fn render(&self) -> String {
        let mut out = String::new();

        if self.low_confidence {
            out.push_str("⚠️ <b>Low-Confidence Signal: for awareness only</b>\n\n");
        }
        if self.contradiction {
            out.push_str(&format!(
                "⚠️ <b>INDECISION</b>: Conflicting signals recently detected for <b>{}</b>\n\n",
                escape_html(self.instrument)
            ));
        }

        let t = self.technicals;
        out.push_str(&format!(
            "📊 Signal from news for <b>{}</b>: {}\n",
            escape_html(self.instrument),
            self.direction
        ));
        out.push_str(&format!("{} {}\n\n", escape_html(self.label), escape_html(self.title)));
        out.push_str(&format!("📈 Confidence: <b>{}%</b>\n", self.confidence));
        out.push_str(&format!("🔁 RSI: {} ({}, {})\n", t.rsi, t.rsi_label, t.rsi_trend));
        out.push_str(&format!("📊 MA: {}\n", t.ma_crossover));
        out.push_str(&format!("🔊 Volume: {}\n\n", t.volume_spike));
        out.push_str(&format!("💬 Analyst: {}\n\n", escape_html(self.rationale)));
        out.push_str(&format!(
            "🔎 Futures-based indicators ({} OHLCV) · AI-generated insight · Not financial advice\n",
            escape_html(self.candle_interval)
        ));
        out.push_str(&format!("🔗 {}\n", escape_html(self.link)));
        out.push_str(&format!(
            "📊 <a href=\"https://www.tradingview.com/symbols/{}/\">View Chart</a>",
            html_escape::encode_double_quoted_attribute(self.instrument)
        ));
        out
    }
}

/// Escape text for Telegram HTML
pub fn escape_html(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}
