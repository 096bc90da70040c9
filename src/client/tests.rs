//! Unit tests for collaborator clients

#[cfg(test)]
mod tests {
    use super::super::binance::{parse_klines, rank_by_volume, Ticker24h};
    use super::super::llm::{parse_classification, parse_guess, parse_quality};
    use crate::types::Direction;

    #[test]
    fn test_parse_quality() {
        let v = parse_quality(
            r#"{"include": true, "score": 82, "type": "Listing", "reason": "Binance lists token"}"#,
        )
        .unwrap();
        assert!(v.include);
        assert_eq!(v.score, 82);
        assert_eq!(v.category, "Listing");
    }

    #[test]
    fn test_parse_quality_with_wrapping_text() {
        let v = parse_quality(
            "Sure! ```json\n{\"include\": \"TRUE\", \"score\": \"75%\", \"type\": \"Hack\", \"reason\": \"exploit\"}\n```",
        )
        .unwrap();
        assert!(v.include);
        assert_eq!(v.score, 75);
    }

    #[test]
    fn test_parse_quality_missing_fields_rejects() {
        let v = parse_quality("{}").unwrap();
        assert!(!v.include);
        assert_eq!(v.score, 0);
        assert_eq!(v.reason, "Not parsed");
    }

    #[test]
    fn test_parse_quality_garbage_is_error() {
        assert!(parse_quality("not json at all").is_err());
    }

    #[test]
    fn test_parse_classification() {
        let c = parse_classification(
            r#"{"signal": "sell", "label": "🔴 Bearish", "confidence": 71, "reason": "outflows"}"#,
        )
        .unwrap();
        assert_eq!(c.direction, Direction::Sell);
        assert_eq!(c.label, "🔴 Bearish");
        assert_eq!(c.confidence, 71);
        assert_eq!(c.rationale, "outflows");
    }

    #[test]
    fn test_parse_classification_clamps_and_defaults_label() {
        let c = parse_classification(r#"{"signal": "BUY", "confidence": 140}"#).unwrap();
        assert_eq!(c.confidence, 100);
        assert_eq!(c.label, "🟢 Bullish");
    }

    #[test]
    fn test_parse_classification_requires_confidence() {
        assert!(parse_classification(r#"{"signal": "BUY"}"#).is_err());
    }

    #[test]
    fn test_parse_guess() {
        assert_eq!(
            parse_guess(r#"{"symbol": " solusdt "}"#).unwrap(),
            Some("SOLUSDT".to_string())
        );
        assert_eq!(parse_guess(r#"{"symbol": "NONE"}"#).unwrap(), None);
        assert_eq!(parse_guess(r#"{"symbol": null}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_klines() {
        let body = serde_json::json!([
            [1700000000000i64, "100.0", "101.5", "99.5", "101.0", "1234.5", 1700000299999i64],
            [1700000300000i64, "101.0", "102.0", "100.5", "101.8", "987.0", 1700000599999i64]
        ]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time, 1700000000000);
        assert_eq!(candles[0].close, 101.0);
        assert_eq!(candles[1].volume, 987.0);
    }

    #[test]
    fn test_parse_klines_error_payload() {
        let body = serde_json::json!({"code": -1121, "msg": "Invalid symbol."});
        assert!(parse_klines(&body).is_err());
    }

    #[test]
    fn test_rank_by_volume() {
        let tickers: Vec<Ticker24h> = serde_json::from_str(
            r#"[
                {"symbol": "BTCUSDT", "quoteVolume": "900000"},
                {"symbol": "ETHBTC", "quoteVolume": "99999999"},
                {"symbol": "SOLUSDT", "quoteVolume": "1200000"},
                {"symbol": "ACTUSDT", "quoteVolume": "500"}
            ]"#,
        )
        .unwrap();
        assert_eq!(rank_by_volume(tickers, 2), vec!["SOLUSDT", "BTCUSDT"]);
    }
}
