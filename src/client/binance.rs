//! Binance USDⓈ-M futures market data

use super::MarketData;
use crate::config::MarketConfig;
use crate::error::{BotError, Result};
use crate::types::Candle;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct BinancePrice {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    contract_type: String,
    #[serde(default)]
    quote_asset: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Ticker24h {
    symbol: String,
    quote_volume: String,
}

pub struct BinanceFutures {
    http: Client,
    base_url: String,
    price_retries: u32,
}

impl BinanceFutures {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            price_retries: config.price_retries.max(1),
        })
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Decimal> {
        let url = format!("{}/fapi/v1/ticker/price", self.base_url);
        let resp: BinancePrice = self.http
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        resp.price
            .parse::<Decimal>()
            .map_err(|e| BotError::Validation(format!("bad price for {}: {}", symbol, e)))
    }
}

/// One kline row: `[openTime, "open", "high", "low", "close", "volume", ...]`
fn parse_kline(row: &serde_json::Value) -> Result<Candle> {
    let field = |i: usize| -> Result<f64> {
        row[i]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .or_else(|| row[i].as_f64())
            .ok_or_else(|| BotError::Api(format!("malformed kline field {}", i)))
    };

    Ok(Candle {
        open_time: row[0]
            .as_i64()
            .ok_or_else(|| BotError::Api("malformed kline open time".into()))?,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}

pub(crate) fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>> {
    body.as_array()
        .ok_or_else(|| BotError::Api(format!("unexpected klines payload: {}", body)))?
        .iter()
        .map(parse_kline)
        .collect()
}

#[async_trait]
impl MarketData for BinanceFutures {
    async fn current_price(&self, symbol: &str) -> Result<Decimal> {
        let mut last_err = None;
        for attempt in 1..=self.price_retries {
            match self.fetch_price(symbol).await {
                Ok(price) => return Ok(price),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    tracing::debug!("Price fetch {} attempt {} failed: {}", symbol, attempt, e);
                    last_err = Some(e);
                    if attempt < self.price_retries {
                        tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| BotError::Api(format!("no price for {}", symbol))))
    }

    async fn candles(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let url = format!("{}/fapi/v1/klines", self.base_url);
        let body: serde_json::Value = self.http
            .get(&url)
            .query(&[
                ("symbol", symbol.to_string()),
                ("interval", interval.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_klines(&body)
    }

    async fn perpetual_symbols(&self) -> Result<Vec<String>> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.base_url);
        let info: ExchangeInfo = self.http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.contract_type == "PERPETUAL" && s.quote_asset == "USDT" && s.status == "TRADING")
            .map(|s| s.symbol)
            .collect())
    }

    async fn top_volume_symbols(&self, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/fapi/v1/ticker/24hr", self.base_url);
        let tickers: Vec<Ticker24h> = self.http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(rank_by_volume(tickers, limit))
    }
}

pub(crate) fn rank_by_volume(tickers: Vec<Ticker24h>, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(Decimal, String)> = tickers
        .into_iter()
        .filter(|t| t.symbol.ends_with("USDT"))
        .filter_map(|t| t.quote_volume.parse::<Decimal>().ok().map(|v| (v, t.symbol)))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.into_iter().take(limit).map(|(_, s)| s).collect()
}
