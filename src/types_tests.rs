//! Tests for core types

#[cfg(test)]
mod tests {
    use super::super::types::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = Fingerprint::from_parts("https://x.io/a", "Mon, 01 Jan 2024 10:00:00 GMT");
        let b = Fingerprint::from_parts("https://x.io/a", "Mon, 01 Jan 2024 10:00:00 GMT");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_depends_on_timestamp() {
        let a = Fingerprint::from_parts("https://x.io/a", "Mon, 01 Jan 2024 10:00:00 GMT");
        let b = Fingerprint::from_parts("https://x.io/a", "Mon, 01 Jan 2024 11:00:00 GMT");
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_ignores_surrounding_whitespace() {
        let a = Fingerprint::from_parts(" https://x.io/a ", "2024");
        let b = Fingerprint::from_parts("https://x.io/a", "2024");
        assert_eq!(a, b);
    }

    #[test]
    fn test_news_item_parses_rfc2822() {
        let item = NewsItem::new(
            "Bitcoin ETF approved",
            "",
            "CoinDesk",
            "https://x.io/btc",
            "Mon, 01 Jan 2024 10:00:00 +0000",
        );
        assert_eq!(
            item.published_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            item.fingerprint,
            Fingerprint::from_parts("https://x.io/btc", "Mon, 01 Jan 2024 10:00:00 +0000")
        );
    }

    #[test]
    fn test_news_item_bad_date() {
        let item = NewsItem::new("t", "", "s", "https://x.io", "yesterday");
        assert!(item.published_at.is_none());
    }

    #[test]
    fn test_direction_serialization() {
        assert_eq!(serde_json::to_string(&Direction::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&Direction::Sell).unwrap(), "\"SELL\"");
        assert_eq!(serde_json::to_string(&Direction::Hold).unwrap(), "\"HOLD\"");
    }

    #[test]
    fn test_direction_parse_lenient() {
        assert_eq!(Direction::parse_lenient(" buy "), Direction::Buy);
        assert_eq!(Direction::parse_lenient("SELL"), Direction::Sell);
        assert_eq!(Direction::parse_lenient("maybe"), Direction::Hold);
    }

    #[test]
    fn test_provenance_round_trip_str() {
        for p in [Provenance::ExactMatch, Provenance::Inferred] {
            assert_eq!(p.as_str().parse::<Provenance>().unwrap(), p);
        }
        assert!("GUESS".parse::<Provenance>().is_err());
    }

    #[test]
    fn test_quality_verdict_gate() {
        let mut v = QualityVerdict {
            include: true,
            score: 60,
            category: "Listing".into(),
            reason: "new listing".into(),
        };
        assert!(v.passes(60));
        v.score = 59;
        assert!(!v.passes(60));
        v.score = 95;
        v.include = false;
        assert!(!v.passes(60));
    }

    #[test]
    fn test_rejected_result_is_not_relevant() {
        let verdict = QualityVerdict {
            include: false,
            score: 20,
            category: "Opinion".into(),
            reason: "price prediction".into(),
        };
        let r = ClassificationResult::rejected(
            Fingerprint::from_hex("ab"),
            verdict.clone(),
            Utc::now(),
        );
        assert!(!r.is_relevant);
        assert!(r.instrument.is_none());
        assert_eq!(r.quality, Some(verdict));
    }

    #[test]
    fn test_penalty_weights_default() {
        let w = PenaltyWeights::default();
        assert_eq!(w.inferred_instrument, 15);
        assert_eq!(w.single_source, 10);
        assert_eq!(w.no_move, 20);
    }

    #[test]
    fn test_penalty_weights_partial_toml() {
        let w: PenaltyWeights = toml::from_str("no_move = 25").unwrap();
        assert_eq!(w.no_move, 25);
        assert_eq!(w.inferred_instrument, 15);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(dec!(100), dec!(99)), Some(dec!(-1.00)));
        assert_eq!(percent_change(dec!(3), dec!(4)), Some(dec!(33.33)));
        assert_eq!(percent_change(dec!(0), dec!(4)), None);
    }
}
