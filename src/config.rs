//! Configuration management
//!
//! Settings come from an optional TOML file layered with `NEWSBOT__`
//! environment variables (e.g. `NEWSBOT__LLM__API_KEY`).

use crate::error::Result;
use crate::types::PenaltyWeights;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub calibration: PenaltyWeights,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("NEWSBOT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("telegram.chat_ids")
                    .with_list_parse_key("feeds.urls")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.database.path = shellexpand::tilde(&config.database.path).into_owned();
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            model: None,
            base_url: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Every authorized channel receives each signal
    #[serde(default)]
    pub chat_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_market_url")]
    pub base_url: String,
    #[serde(default = "default_candle_interval")]
    pub candle_interval: String,
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,
    /// Attempts per price fetch before the call is reported as failed
    #[serde(default = "default_price_retries")]
    pub price_retries: u32,
    /// Size of the high-liquidity allow-list, ranked by 24h quote volume
    #[serde(default = "default_top_volume")]
    pub top_volume_count: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: default_market_url(),
            candle_interval: default_candle_interval(),
            candle_limit: default_candle_limit(),
            price_retries: default_price_retries(),
            top_volume_count: default_top_volume(),
        }
    }
}

fn default_market_url() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_candle_interval() -> String {
    "5m".to_string()
}

fn default_candle_limit() -> usize {
    50
}

fn default_price_retries() -> u32 {
    3
}

fn default_top_volume() -> usize {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
    #[serde(default = "default_feed_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            urls: default_feed_urls(),
            timeout_secs: default_feed_timeout(),
        }
    }
}

fn default_feed_urls() -> Vec<String> {
    [
        "https://cointelegraph.com/rss",
        "https://www.coindesk.com/arc/outboundfeeds/rss/",
        "https://decrypt.co/feed",
        "https://www.theblock.co/rss",
        "https://bitcoinmagazine.com/.rss/full/",
        "https://cryptoslate.com/feed/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_feed_timeout() -> u64 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Quality score below which an item is rejected
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: u8,
    /// Cached classifications below this confidence are not re-emitted
    #[serde(default = "default_cached_min_confidence")]
    pub cached_min_confidence: u8,
    /// Raw confidence below this gets a low-confidence banner
    #[serde(default = "default_banner_below")]
    pub low_confidence_banner_below: u8,
    #[serde(default = "default_contradiction_window")]
    pub contradiction_window_mins: i64,
    #[serde(default = "default_verify_delay")]
    pub verify_delay_secs: i64,
    #[serde(default = "default_ingest_interval")]
    pub ingest_interval_secs: u64,
    #[serde(default = "default_verify_interval")]
    pub verify_interval_secs: u64,
    #[serde(default = "default_learn_interval")]
    pub learn_interval_secs: u64,
    /// Number of recent resolved signals the learner looks at
    #[serde(default = "default_learn_window")]
    pub learn_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            cached_min_confidence: default_cached_min_confidence(),
            low_confidence_banner_below: default_banner_below(),
            contradiction_window_mins: default_contradiction_window(),
            verify_delay_secs: default_verify_delay(),
            ingest_interval_secs: default_ingest_interval(),
            verify_interval_secs: default_verify_interval(),
            learn_interval_secs: default_learn_interval(),
            learn_window: default_learn_window(),
        }
    }
}

fn default_quality_threshold() -> u8 {
    60
}

fn default_cached_min_confidence() -> u8 {
    60
}

fn default_banner_below() -> u8 {
    70
}

fn default_contradiction_window() -> i64 {
    60
}

fn default_verify_delay() -> i64 {
    3 * 60 * 60
}

fn default_ingest_interval() -> u64 {
    300
}

fn default_verify_interval() -> u64 {
    60
}

fn default_learn_interval() -> u64 {
    24 * 60 * 60
}

fn default_learn_window() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Base tokens that are also ordinary English words
    #[serde(default = "default_ambiguous_tokens")]
    pub ambiguous_tokens: Vec<String>,
    /// Refresh the symbol universe from the exchange at startup
    #[serde(default = "default_true")]
    pub refresh_universe: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ambiguous_tokens: default_ambiguous_tokens(),
            refresh_universe: true,
        }
    }
}

fn default_ambiguous_tokens() -> Vec<String> {
    [
        "ACT", "ONE", "NOT", "GAS", "MEME", "PEOPLE", "TRUMP", "AI", "ME", "BANANA", "DOG",
        "DOGS", "CAT", "MOVE", "ALPHA", "HIGH", "LOW", "TRU", "SUN", "BAN", "HOOK", "KEY",
        "REZ", "GOAT", "MAX", "USUAL", "VANA", "SAFE", "SAGA", "ORDER", "EPIC", "FORM",
        "PROMPT", "MAGIC", "BAND", "FUN", "THE", "HOT", "BIG", "AUCTION", "FLOW", "SAND",
        "ROSE", "MASK", "DUSK", "RARE", "BOND", "HOME", "BANK", "SIGN", "SKY", "SUPER",
        "PORTAL", "PIXEL", "COOKIE", "STORY", "VIRTUAL", "ACE", "EDU", "JOE", "ICE", "WIN",
        "SPELL", "BLUR",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "data/signals.db".to_string()
}
