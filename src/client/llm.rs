//! LLM-backed news analyst
//!
//! Talks to any OpenAI-compatible `/v1/chat/completions` endpoint and asks
//! for JSON replies.

use super::{ClassificationContext, NewsAnalyst};
use crate::config::LlmConfig;
use crate::error::{BotError, Result};
use crate::types::{Classification, Direction, QualityVerdict};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub struct LlmAnalyst {
    http: Client,
    llm_config: LlmConfig,
}

impl LlmAnalyst {
    pub fn new(llm_config: LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(llm_config.timeout_secs))
            .build()?;
        Ok(Self { http, llm_config })
    }

    fn endpoint(&self) -> (String, String) {
        match self.llm_config.provider.to_lowercase().as_str() {
            "deepseek" => (
                self.llm_config.base_url.clone().unwrap_or_else(|| "https://api.deepseek.com".to_string()),
                self.llm_config.model.clone().unwrap_or_else(|| "deepseek-chat".to_string()),
            ),
            "ollama" => (
                self.llm_config.base_url.clone().unwrap_or_else(|| "http://localhost:11434".to_string()),
                self.llm_config.model.clone().unwrap_or_else(|| "qwen2.5:14b".to_string()),
            ),
            _ => (
                self.llm_config.base_url.clone().unwrap_or_else(|| "https://api.openai.com".to_string()),
                self.llm_config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            ),
        }
    }

    async fn call_llm(&self, prompt: &str, temperature: f64) -> Result<String> {
        let (base_url, model) = self.endpoint();

        let request = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature,
            "response_format": {"type": "json_object"}
        });

        let mut req = self.http
            .post(format!("{}/v1/chat/completions", base_url))
            .header("content-type", "application/json");

        if !self.llm_config.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.llm_config.api_key));
        }

        let resp: serde_json::Value = req
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        resp["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| BotError::Api("Empty LLM response".into()))
    }
}

#[async_trait]
impl NewsAnalyst for LlmAnalyst {
    async fn evaluate_quality(
        &self,
        title: &str,
        summary: &str,
        source: &str,
    ) -> Result<QualityVerdict> {
        let prompt = format!(
            r#"You are a filter for market-moving crypto news. Decide whether this item is hard news
(listing, regulation, hack, upgrade, macro, whale movement, partnership) rather than opinion,
price prediction or promotion.

Source: {}
Title: {}
Summary: {}

Respond with JSON:
{{
  "include": true/false,
  "score": 0-100,
  "type": "Listing/Regulation/Hack/Upgrade/Macro/Whale/Other",
  "reason": "brief explanation in your own words"
}}"#,
            source, title, summary
        );

        let response = self.call_llm(&prompt, 0.1).await?;
        parse_quality(&response)
    }

    async fn classify(&self, ctx: &ClassificationContext) -> Result<Classification> {
        let prompt = format!(
            r#"You are a crypto signal analyst. Interpret the news together with the technical indicators.

News Title: {}
Summary: {}
Asset: {}
Time: {}
Source: {}
Market Change (1h): {}
Recent signals on this asset: {}
Technical Indicators:
- RSI: {} ({}, {})
- MA Crossover: {}
- Volume Spike: {}

Respond with JSON:
{{
  "signal": "BUY/SELL/HOLD",
  "label": "short label such as 🟢 Bullish",
  "confidence": 0-100,
  "reason": "in your own words, no quotes"
}}"#,
            ctx.title,
            ctx.summary,
            ctx.instrument,
            ctx.timestamp.format("%Y-%m-%d %H:%M UTC"),
            ctx.source,
            ctx.market_change,
            if ctx.recent_activity { "yes" } else { "no" },
            ctx.technicals.rsi,
            ctx.technicals.rsi_label,
            ctx.technicals.rsi_trend,
            ctx.technicals.ma_crossover,
            ctx.technicals.volume_spike,
        );

        let response = self.call_llm(&prompt, 0.3).await?;
        parse_classification(&response)
    }

    async fn guess_instrument(&self, title: &str, summary: &str) -> Result<Option<String>> {
        let prompt = format!(
            r#"You are a crypto analyst. Based on the news below, guess the ONE most relevant
Binance USDT perpetual futures symbol (e.g. BTCUSDT, ETHUSDT, XRPUSDT).
If unsure, answer NONE.

Title: {}
Summary: {}

Respond with JSON: {{"symbol": "XXXUSDT or NONE"}}"#,
            title, summary
        );

        let response = self.call_llm(&prompt, 0.2).await?;
        parse_guess(&response)
    }
}

/// Cut the outermost JSON object out of a reply that may carry extra text
fn json_body(response: &str) -> Result<serde_json::Value> {
    let body = match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response,
    };
    serde_json::from_str(body)
        .map_err(|e| BotError::Validation(format!("Failed to parse LLM response: {}", e)))
}

/// Accept scores given as numbers or strings like "85%"
fn score_field(value: &serde_json::Value) -> Option<u8> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
            digits.parse::<f64>().ok()?
        }
        _ => return None,
    };
    Some(n.round().clamp(0.0, 100.0) as u8)
}

pub(crate) fn parse_quality(response: &str) -> Result<QualityVerdict> {
    let parsed = json_body(response)?;

    let include = match &parsed["include"] {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };

    Ok(QualityVerdict {
        include,
        score: score_field(&parsed["score"]).unwrap_or(0),
        category: parsed["type"].as_str().unwrap_or("Unknown").to_string(),
        reason: parsed["reason"].as_str().unwrap_or("Not parsed").to_string(),
    })
}

pub(crate) fn parse_classification(response: &str) -> Result<Classification> {
    let parsed = json_body(response)?;

    let direction = Direction::parse_lenient(parsed["signal"].as_str().unwrap_or("HOLD"));
    let confidence = score_field(&parsed["confidence"])
        .ok_or_else(|| BotError::Validation("classification without confidence".into()))?;
    let label = parsed["label"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| direction.default_label().to_string());

    Ok(Classification {
        direction,
        label,
        confidence,
        rationale: parsed["reason"].as_str().unwrap_or("").trim().to_string(),
    })
}

pub(crate) fn parse_guess(response: &str) -> Result<Option<String>> {
    let parsed = json_body(response)?;
    Ok(parsed["symbol"]
        .as_str()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty() && s != "NONE" && s != "NULL"))
}
