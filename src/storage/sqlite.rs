//! SQLite-backed store
//!
//! Timestamps are stored as Unix milliseconds and decimals as text so values
//! read back compare equal to what was written.

use super::{
    PendingQueue, ResultCache, SeenStore, SignalLog, Store, VerificationUpdate, WeightStore,
};
use crate::error::{BotError, Result};
use crate::types::{
    ClassificationResult, Fingerprint, PenaltyWeights, PendingVerification, SignalRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS seen_news (
        fingerprint TEXT PRIMARY KEY,
        seen_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS classification_cache (
        fingerprint TEXT PRIMARY KEY,
        is_relevant INTEGER NOT NULL,
        confidence INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        payload TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS signals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        fingerprint TEXT NOT NULL,
        instrument TEXT NOT NULL,
        direction TEXT NOT NULL,
        label TEXT NOT NULL,
        title TEXT NOT NULL,
        confidence INTEGER NOT NULL,
        raw_confidence INTEGER NOT NULL,
        provenance TEXT NOT NULL,
        source_count INTEGER NOT NULL,
        ts INTEGER NOT NULL,
        price_at_signal TEXT NOT NULL,
        price_after TEXT,
        percent_change TEXT,
        rsi REAL
    )",
    "CREATE INDEX IF NOT EXISTS idx_signals_instrument_ts ON signals (instrument, ts)",
    "CREATE TABLE IF NOT EXISTS pending_verifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        instrument TEXT NOT NULL,
        signal_ts INTEGER NOT NULL,
        price_at_signal TEXT NOT NULL,
        check_after INTEGER NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS penalty_weights (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        inferred_instrument INTEGER NOT NULL,
        single_source INTEGER NOT NULL,
        no_move INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
];

const SIGNAL_COLUMNS: &str = "id, fingerprint, instrument, direction, label, title, confidence, \
    raw_confidence, provenance, source_count, ts, price_at_signal, price_after, percent_change, rsi";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file and apply the schema
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BotError::StorageUnavailable(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", path)).await?;
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::info!("📦 Database ready at {}", path);
        Ok(store)
    }

    /// Private in-memory database, used by dry runs
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| BotError::Validation(format!("timestamp out of range: {}", ms)))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .map_err(|e| BotError::Validation(format!("bad decimal {:?}: {}", s, e)))
}

fn parse_opt_decimal(s: Option<String>) -> Result<Option<Decimal>> {
    s.as_deref().map(parse_decimal).transpose()
}

fn signal_from_row(row: &SqliteRow) -> Result<SignalRecord> {
    let direction: String = row.try_get("direction")?;
    let provenance: String = row.try_get("provenance")?;
    let price_at_signal: String = row.try_get("price_at_signal")?;
    let confidence: i64 = row.try_get("confidence")?;
    let raw_confidence: i64 = row.try_get("raw_confidence")?;
    let source_count: i64 = row.try_get("source_count")?;

    Ok(SignalRecord {
        id: row.try_get("id")?,
        fingerprint: Fingerprint::from_hex(row.try_get::<String, _>("fingerprint")?),
        instrument: row.try_get("instrument")?,
        direction: direction.parse()?,
        label: row.try_get("label")?,
        title: row.try_get("title")?,
        confidence: confidence.clamp(0, 100) as u8,
        raw_confidence: raw_confidence.clamp(0, 100) as u8,
        provenance: provenance.parse()?,
        source_count: source_count.max(0) as u32,
        timestamp: from_millis(row.try_get("ts")?)?,
        price_at_signal: parse_decimal(&price_at_signal)?,
        price_after: parse_opt_decimal(row.try_get("price_after")?)?,
        percent_change: parse_opt_decimal(row.try_get("percent_change")?)?,
        rsi: row.try_get("rsi")?,
    })
}

fn pending_from_row(row: &SqliteRow) -> Result<PendingVerification> {
    let price: String = row.try_get("price_at_signal")?;
    let attempts: i64 = row.try_get("attempts")?;
    Ok(PendingVerification {
        id: row.try_get("id")?,
        instrument: row.try_get("instrument")?,
        signal_timestamp: from_millis(row.try_get("signal_ts")?)?,
        price_at_signal: parse_decimal(&price)?,
        check_after: from_millis(row.try_get("check_after")?)?,
        attempts: attempts.max(0) as u32,
    })
}

#[async_trait]
impl SeenStore for SqliteStore {
    async fn seen(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM seen_news WHERE fingerprint = ?")
            .bind(fingerprint.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn mark_seen(&self, fingerprint: &Fingerprint) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO seen_news (fingerprint, seen_at) VALUES (?, ?)")
            .bind(fingerprint.as_str())
            .bind(to_millis(Utc::now()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ResultCache for SqliteStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<ClassificationResult>> {
        let row = sqlx::query("SELECT payload FROM classification_cache WHERE fingerprint = ?")
            .bind(fingerprint.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, result: &ClassificationResult) -> Result<()> {
        let payload = serde_json::to_string(result)?;
        sqlx::query(
            "INSERT OR IGNORE INTO classification_cache
             (fingerprint, is_relevant, confidence, created_at, payload)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(result.fingerprint.as_str())
        .bind(result.is_relevant)
        .bind(result.confidence as i64)
        .bind(to_millis(result.created_at))
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_confidence(&self, fingerprint: &Fingerprint, confidence: u8) -> Result<()> {
        sqlx::query(
            "UPDATE classification_cache
             SET confidence = ?, payload = json_set(payload, '$.confidence', ?)
             WHERE fingerprint = ?",
        )
        .bind(confidence as i64)
        .bind(confidence as i64)
        .bind(fingerprint.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_rejected(&self) -> Result<Option<ClassificationResult>> {
        let row = sqlx::query(
            "SELECT payload FROM classification_cache
             WHERE is_relevant = 0 ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SignalLog for SqliteStore {
    async fn signals_for_instrument(
        &self,
        instrument: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SignalRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM signals WHERE instrument = ? AND ts >= ? AND ts <= ? ORDER BY ts",
            SIGNAL_COLUMNS
        ))
        .bind(instrument)
        .bind(to_millis(since))
        .bind(to_millis(until))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(signal_from_row).collect()
    }

    async fn find_unresolved(
        &self,
        instrument: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<SignalRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM signals
             WHERE instrument = ? AND ts = ? AND percent_change IS NULL
             ORDER BY id LIMIT 1",
            SIGNAL_COLUMNS
        ))
        .bind(instrument)
        .bind(to_millis(timestamp))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(signal_from_row).transpose()
    }

    async fn recent_resolved(&self, limit: usize) -> Result<Vec<SignalRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM signals WHERE percent_change IS NOT NULL
             ORDER BY ts DESC, id DESC LIMIT ?",
            SIGNAL_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(signal_from_row).collect()
    }

    async fn signals_since(&self, since: DateTime<Utc>) -> Result<Vec<SignalRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM signals WHERE ts >= ? ORDER BY ts, id",
            SIGNAL_COLUMNS
        ))
        .bind(to_millis(since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(signal_from_row).collect()
    }
}

#[async_trait]
impl PendingQueue for SqliteStore {
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<PendingVerification>> {
        let rows = sqlx::query(
            "SELECT id, instrument, signal_ts, price_at_signal, check_after, attempts
             FROM pending_verifications WHERE check_after <= ? ORDER BY check_after, id",
        )
        .bind(to_millis(now))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(pending_from_row).collect()
    }

    async fn remove_pending(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM pending_verifications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_failure(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE pending_verifications SET attempts = attempts + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WeightStore for SqliteStore {
    async fn load_weights(&self) -> Result<Option<PenaltyWeights>> {
        let row = sqlx::query(
            "SELECT inferred_instrument, single_source, no_move FROM penalty_weights WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let inferred: i64 = row.try_get("inferred_instrument")?;
                let single: i64 = row.try_get("single_source")?;
                let no_move: i64 = row.try_get("no_move")?;
                Ok(Some(PenaltyWeights {
                    inferred_instrument: inferred.max(0) as u32,
                    single_source: single.max(0) as u32,
                    no_move: no_move.max(0) as u32,
                }))
            }
            None => Ok(None),
        }
    }

    async fn save_weights(&self, weights: &PenaltyWeights) -> Result<()> {
        sqlx::query(
            "INSERT INTO penalty_weights (id, inferred_instrument, single_source, no_move, updated_at)
             VALUES (1, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                inferred_instrument = excluded.inferred_instrument,
                single_source = excluded.single_source,
                no_move = excluded.no_move,
                updated_at = excluded.updated_at",
        )
        .bind(weights.inferred_instrument as i64)
        .bind(weights.single_source as i64)
        .bind(weights.no_move as i64)
        .bind(to_millis(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn commit_emission(
        &self,
        record: &SignalRecord,
        check_after: DateTime<Utc>,
    ) -> Result<SignalRecord> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO signals
             (fingerprint, instrument, direction, label, title, confidence, raw_confidence,
              provenance, source_count, ts, price_at_signal, rsi)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.fingerprint.as_str())
        .bind(&record.instrument)
        .bind(record.direction.as_str())
        .bind(&record.label)
        .bind(&record.title)
        .bind(record.confidence as i64)
        .bind(record.raw_confidence as i64)
        .bind(record.provenance.as_str())
        .bind(record.source_count as i64)
        .bind(to_millis(record.timestamp))
        .bind(record.price_at_signal.to_string())
        .bind(record.rsi)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        sqlx::query(
            "INSERT INTO pending_verifications
             (instrument, signal_ts, price_at_signal, check_after, attempts)
             VALUES (?, ?, ?, ?, 0)",
        )
        .bind(&record.instrument)
        .bind(to_millis(record.timestamp))
        .bind(record.price_at_signal.to_string())
        .bind(to_millis(check_after))
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO seen_news (fingerprint, seen_at) VALUES (?, ?)")
            .bind(record.fingerprint.as_str())
            .bind(to_millis(Utc::now()))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let mut stored = record.clone();
        stored.id = id;
        Ok(stored)
    }

    async fn commit_verification(&self, update: &VerificationUpdate) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE signals SET price_after = ?, percent_change = ?, confidence = ?
             WHERE id = ? AND percent_change IS NULL",
        )
        .bind(update.price_after.to_string())
        .bind(update.percent_change.to_string())
        .bind(update.confidence as i64)
        .bind(update.record_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(BotError::Validation(format!(
                "signal {} missing or already resolved",
                update.record_id
            )));
        }

        sqlx::query(
            "UPDATE classification_cache
             SET confidence = ?, payload = json_set(payload, '$.confidence', ?)
             WHERE fingerprint = ?",
        )
        .bind(update.confidence as i64)
        .bind(update.confidence as i64)
        .bind(update.fingerprint.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM pending_verifications WHERE id = ?")
            .bind(update.pending_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
