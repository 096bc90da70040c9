//! Unit tests for feedback module

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::client::MockMarketData;
    use crate::error::BotError;
    use crate::storage::{MemoryStore, PendingQueue, SqliteStore, Store};
    use crate::types::{
        ClassificationResult, Direction, Fingerprint, PenaltyWeights, Provenance, SignalRecord,
    };
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn record() -> SignalRecord {
        SignalRecord {
            id: 0,
            fingerprint: Fingerprint::from_parts("https://example.com/a", "Sat, 01 Jun 2024 08:55:00 GMT"),
            instrument: "SOLUSDT".to_string(),
            direction: Direction::Buy,
            label: Direction::Buy.default_label().to_string(),
            title: "Solana ETF filing".to_string(),
            confidence: 70,
            raw_confidence: 80,
            provenance: Provenance::ExactMatch,
            source_count: 1,
            timestamp: t0(),
            price_at_signal: dec!(100),
            price_after: None,
            percent_change: None,
            rsi: Some(55.0),
        }
    }

    fn cached(record: &SignalRecord) -> ClassificationResult {
        ClassificationResult {
            fingerprint: record.fingerprint.clone(),
            is_relevant: true,
            instrument: Some(record.instrument.clone()),
            direction: record.direction,
            label: record.label.clone(),
            confidence: record.confidence,
            raw_confidence: record.raw_confidence,
            rationale: "filing".to_string(),
            provenance: Some(record.provenance),
            source_count: record.source_count,
            quality: None,
            created_at: t0(),
        }
    }

    fn priced_at(price: Decimal) -> MockMarketData {
        let mut market = MockMarketData::new();
        market.expect_current_price().returning(move |_| Ok(price));
        market
    }

    fn verifier(store: Arc<dyn Store>, market: MockMarketData) -> OutcomeVerifier {
        OutcomeVerifier::new(
            store,
            Arc::new(market),
            Arc::new(WeightsHandle::new(PenaltyWeights::default())),
        )
    }

    async fn emit(store: &dyn Store) -> SignalRecord {
        let r = record();
        store.put(&cached(&r)).await.unwrap();
        store.commit_emission(&r, t0() + Duration::hours(3)).await.unwrap()
    }

    async fn assert_drop_lowers_confidence(store: Arc<dyn Store>) {
        let emitted = emit(&*store).await;

        let report = verifier(store.clone(), priced_at(dec!(99)))
            .run_once(t0() + Duration::hours(3))
            .await
            .unwrap();
        assert_eq!(report.resolved, 1);

        let resolved = store
            .signals_for_instrument("SOLUSDT", t0(), t0())
            .await
            .unwrap()
            .remove(0);
        assert_eq!(resolved.id, emitted.id);
        assert_eq!(resolved.price_after, Some(dec!(99)));
        assert_eq!(resolved.percent_change, Some(dec!(-1.00)));
        // 80 - single source 10 - no move 20
        assert_eq!(resolved.confidence, 50);
        assert!(resolved.confidence < emitted.confidence);

        let cache = store.get(&emitted.fingerprint).await.unwrap().unwrap();
        assert_eq!(cache.confidence, 50);
        assert!(store.due(t0() + Duration::days(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_lowers_confidence_memory() {
        assert_drop_lowers_confidence(Arc::new(MemoryStore::new())).await;
    }

    #[tokio::test]
    async fn test_drop_lowers_confidence_sqlite() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_drop_lowers_confidence(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn test_rise_keeps_confidence() {
        let store = Arc::new(MemoryStore::new());
        emit(&*store).await;

        verifier(store.clone(), priced_at(dec!(102.5)))
            .run_once(t0() + Duration::hours(4))
            .await
            .unwrap();

        let resolved = &store.all_signals()[0];
        assert_eq!(resolved.percent_change, Some(dec!(2.50)));
        assert_eq!(resolved.confidence, 70);
    }

    #[tokio::test]
    async fn test_not_due_yet() {
        let store = Arc::new(MemoryStore::new());
        emit(&*store).await;

        let mut market = MockMarketData::new();
        market.expect_current_price().times(0);
        let report = verifier(store.clone(), market)
            .run_once(t0() + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(report, VerifyReport::default());
        assert_eq!(store.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_price_failure_keeps_pending() {
        let store = Arc::new(MemoryStore::new());
        emit(&*store).await;

        let mut market = MockMarketData::new();
        market
            .expect_current_price()
            .returning(|_| Err(BotError::Api("rate limited".into())));
        let report = verifier(store.clone(), market)
            .run_once(t0() + Duration::hours(3))
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        let pending = store.due(t0() + Duration::hours(3)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert!(!store.all_signals()[0].is_resolved());
    }

    #[tokio::test]
    async fn test_already_resolved_pending_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        let emitted = emit(&*store).await;
        // resolved elsewhere, pending left behind
        store
            .commit_verification(&VerificationUpdate {
                pending_id: -1,
                record_id: emitted.id,
                fingerprint: emitted.fingerprint.clone(),
                price_after: dec!(101),
                percent_change: dec!(1.00),
                confidence: 70,
            })
            .await
            .unwrap();

        let report = verifier(store.clone(), priced_at(dec!(90)))
            .run_once(t0() + Duration::hours(3))
            .await
            .unwrap();

        assert_eq!(report.discarded, 1);
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.all_signals()[0].percent_change, Some(dec!(1.00)));
    }

    #[tokio::test]
    async fn test_recalibration_uses_current_weights() {
        let store = Arc::new(MemoryStore::new());
        emit(&*store).await;

        let weights = Arc::new(WeightsHandle::new(PenaltyWeights::default()));
        weights.swap(PenaltyWeights {
            no_move: 5,
            ..PenaltyWeights::default()
        });
        let v = OutcomeVerifier::new(store.clone(), Arc::new(priced_at(dec!(99))), weights);
        v.run_once(t0() + Duration::hours(3)).await.unwrap();

        assert_eq!(store.all_signals()[0].confidence, 65);
    }
}
