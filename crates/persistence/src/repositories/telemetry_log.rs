//! Message log repository for database operations.
//!
//! Writes are conditional on the natural key, so replaying a batch never
//! creates a second row.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use domain::models::{TelemetryRecord, ZoneEvent};
use domain::repository::{InsertOutcome, LogPage, RangeQuery, TelemetryLog};
use domain::services::message_transformer::DEFAULT_RETENTION_DAYS;
use domain::DomainResult;
use shared::pagination::{decode_cursor, encode_cursor};

use crate::entities::device_message::{DeviceMessageEntity, MessageColumns};
use crate::metrics::{record_rows_purged, QueryTimer};

/// Repository for the `device_messages` and `zone_events` tables.
#[derive(Clone)]
pub struct TelemetryLogRepository {
    pool: PgPool,
}

impl TelemetryLogRepository {
    /// Creates a new TelemetryLogRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn outcome(rows_affected: u64) -> InsertOutcome {
    if rows_affected == 0 {
        InsertOutcome::AlreadyPresent
    } else {
        InsertOutcome::Inserted
    }
}

#[async_trait]
impl TelemetryLog for TelemetryLogRepository {
    async fn insert_record(&self, record: &TelemetryRecord) -> DomainResult<InsertOutcome> {
        let columns = MessageColumns::from(&record.reading);

        let timer = QueryTimer::start("insert_device_message");
        let result = sqlx::query(
            r#"
            INSERT INTO device_messages (
                device_id, timestamp, message_type, lat, lon, accuracy,
                temperature, fulfilled_with, device_ts, received_at, ttl
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (device_id, timestamp) DO NOTHING
            "#,
        )
        .bind(&record.device_id)
        .bind(record.timestamp)
        .bind(record.message_type().as_str())
        .bind(columns.lat)
        .bind(columns.lon)
        .bind(columns.accuracy)
        .bind(columns.temperature)
        .bind(columns.fulfilled_with)
        .bind(record.device_ts)
        .bind(record.received_at)
        .bind(record.ttl)
        .execute(&self.pool)
        .await;
        timer.finish(&result);

        let result = result.context("insert device message")?;
        Ok(outcome(result.rows_affected()))
    }

    async fn insert_zone_event(&self, event: &ZoneEvent) -> DomainResult<InsertOutcome> {
        let ttl = (event.detected_at + Duration::days(DEFAULT_RETENTION_DAYS)).timestamp();

        let timer = QueryTimer::start("insert_zone_event");
        let result = sqlx::query(
            r#"
            INSERT INTO zone_events (
                device_id, timestamp, zone_id, event_type, zone_name,
                lat, lon, accuracy, location_timestamp, detected_at, ttl
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (device_id, timestamp, zone_id) DO NOTHING
            "#,
        )
        .bind(&event.device_id)
        .bind(event.timestamp)
        .bind(&event.zone_id)
        .bind(event.event_type.as_str())
        .bind(&event.zone_name)
        .bind(event.location.lat)
        .bind(event.location.lon)
        .bind(event.location.accuracy)
        .bind(event.location.timestamp)
        .bind(event.detected_at)
        .bind(ttl)
        .execute(&self.pool)
        .await;
        timer.finish(&result);

        let result = result.context("insert zone event")?;
        Ok(outcome(result.rows_affected()))
    }

    async fn delete_expired(&self, now: DateTime<Utc>, batch_size: usize) -> DomainResult<u64> {
        let cutoff = now.timestamp();
        let limit = i64::try_from(batch_size).unwrap_or(i64::MAX);
        let mut deleted = 0;

        for table in ["device_messages", "zone_events"] {
            let timer = QueryTimer::start(format!("delete_expired_{table}"));
            let result = sqlx::query(&format!(
                r#"
                DELETE FROM {table}
                WHERE ctid IN (
                    SELECT ctid FROM {table}
                    WHERE ttl IS NOT NULL AND ttl < $1
                    LIMIT $2
                )
                "#
            ))
            .bind(cutoff)
            .bind(limit)
            .execute(&self.pool)
            .await;
            timer.finish(&result);

            let result = result.with_context(|| format!("delete expired rows from {table}"))?;
            record_rows_purged(table, result.rows_affected());
            deleted += result.rows_affected();
        }

        Ok(deleted)
    }

    async fn query_range(&self, query: &RangeQuery) -> DomainResult<LogPage> {
        let before = match &query.exclusive_start {
            Some(cursor) => Some(decode_cursor(cursor)?.1),
            None => None,
        };
        let page_size = i64::from(query.page_size.max(1));

        let timer = QueryTimer::start("query_device_messages");
        let rows = sqlx::query_as::<_, DeviceMessageEntity>(
            r#"
            SELECT device_id, timestamp, message_type, lat, lon, accuracy,
                   temperature, fulfilled_with, device_ts, received_at, ttl
            FROM device_messages
            WHERE device_id = $1
              AND timestamp BETWEEN $2 AND $3
              AND ($4::timestamptz IS NULL OR timestamp < $4)
            ORDER BY timestamp DESC
            LIMIT $5
            "#,
        )
        .bind(&query.device_id)
        .bind(query.start)
        .bind(query.end)
        .bind(before)
        .bind(page_size + 1)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&rows);

        let mut rows = rows.context("query device messages")?;
        let more = rows.len() as i64 > page_size;
        rows.truncate(page_size as usize);

        let last_evaluated_key = match rows.last() {
            Some(last) if more => Some(encode_cursor(&last.device_id, last.timestamp)),
            _ => None,
        };

        let items = rows
            .into_iter()
            .filter(|row| {
                query
                    .message_type
                    .map_or(true, |t| row.message_type == t.as_str())
            })
            .filter_map(|row| {
                let key = (row.device_id.clone(), row.timestamp);
                match TelemetryRecord::try_from(row) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(
                            device_id = %key.0,
                            timestamp = %key.1,
                            error = %e,
                            "Skipping unreadable message row"
                        );
                        None
                    }
                }
            })
            .collect();

        Ok(LogPage {
            items,
            last_evaluated_key,
        })
    }
}
