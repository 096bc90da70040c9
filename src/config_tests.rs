//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use std::io::Write;

    #[test]
    fn test_pipeline_config_defaults() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config.quality_threshold, 60);
        assert_eq!(config.cached_min_confidence, 60);
        assert_eq!(config.contradiction_window_mins, 60);
        assert_eq!(config.verify_delay_secs, 10_800);
        assert_eq!(config.learn_window, 100);
    }

    #[test]
    fn test_market_config_defaults() {
        let config = MarketConfig::default();
        assert_eq!(config.base_url, "https://fapi.binance.com");
        assert_eq!(config.candle_interval, "5m");
        assert_eq!(config.candle_limit, 50);
        assert_eq!(config.price_retries, 3);
    }

    #[test]
    fn test_telegram_config_multiple_chats() {
        let toml_str = r#"
bot_token = "123:abc"
chat_ids = ["-1001", "-1002"]
"#;
        let config: TelegramConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.chat_ids, vec!["-1001", "-1002"]);
    }

    #[test]
    fn test_resolver_defaults_include_act() {
        let config = ResolverConfig::default();
        assert!(config.ambiguous_tokens.iter().any(|t| t == "ACT"));
        assert!(!config.ambiguous_tokens.iter().any(|t| t == "BTC"));
    }

    #[test]
    fn test_full_config_from_toml() {
        let toml_str = r#"
[llm]
provider = "deepseek"
api_key = "sk-test"

[telegram]
bot_token = "123:abc"
chat_ids = ["42"]

[pipeline]
quality_threshold = 70

[calibration]
inferred_instrument = 5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.provider, "deepseek");
        assert_eq!(config.pipeline.quality_threshold, 70);
        assert_eq!(config.pipeline.verify_delay_secs, 10_800);
        assert_eq!(config.calibration.inferred_instrument, 5);
        assert_eq!(config.calibration.no_move, 20);
        assert_eq!(config.feeds.urls.len(), 6);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[database]\npath = \"~/signals.db\"\n[pipeline]\nlearn_window = 50"
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.pipeline.learn_window, 50);
        assert!(!config.database.path.starts_with('~'));
        assert!(config.telegram.is_none());
    }
}
