//! Tests for error classification

#[cfg(test)]
mod tests {
    use super::super::error::*;

    #[test]
    fn test_external_failures_are_transient() {
        let err = BotError::Api("429 Too Many Requests".into());
        assert_eq!(err.kind(), ErrorKind::TransientExternal);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_http_error_is_transient() {
        let err: BotError = reqwest::Client::new()
            .get("not a url")
            .send()
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::TransientExternal);
        assert!(err.is_transient());
    }

    #[test]
    fn test_storage_failures() {
        let db: BotError = sqlx::Error::RowNotFound.into();
        assert_eq!(db.kind(), ErrorKind::StorageUnavailable);
        assert!(db.is_transient());

        let locked = BotError::StorageUnavailable("database is locked".into());
        assert_eq!(locked.kind(), ErrorKind::StorageUnavailable);
        assert!(locked.is_transient());
    }

    #[test]
    fn test_insufficient_data() {
        let err = BotError::InsufficientData {
            required: 50,
            actual: 12,
        };
        assert_eq!(err.kind(), ErrorKind::DataInsufficient);
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "Insufficient data: need 50, got 12");
    }

    #[test]
    fn test_malformed_input_is_validation_failure() {
        let json: BotError = serde_json::from_str::<u8>("not json").unwrap_err().into();
        assert_eq!(json.kind(), ErrorKind::ValidationFailure);

        let feed = crate::ingester::rss::parse_feed("not xml at all").unwrap_err();
        assert_eq!(feed.kind(), ErrorKind::ValidationFailure);

        let guard = BotError::Validation("symbol outside universe".into());
        assert_eq!(guard.kind(), ErrorKind::ValidationFailure);

        for err in [json, feed, guard] {
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn test_config_error() {
        let err: BotError = config::ConfigError::Message("missing llm.api_key".into()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.is_transient());
    }
}
