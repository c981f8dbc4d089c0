//! In-process implementation of the storage traits.
//!
//! Backs the `memory` storage backend and the pipeline tests. Retention is
//! honoured through `delete_expired`, which the purge job calls on the same
//! schedule as for PostgreSQL. Outages and slow responses can be simulated
//! per device.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use shared::pagination::{decode_cursor, encode_cursor};
use tokio::sync::RwLock;

use super::{
    DeviceStateStore, InsertOutcome, LogPage, RangeQuery, SafeZoneStore, TelemetryLog,
};
use crate::error::DomainResult;
use crate::models::{DeviceState, DeviceStateUpdate, SafeZone, TelemetryRecord, ZoneEvent};
use crate::services::message_transformer::DEFAULT_RETENTION_DAYS;

type RecordKey = (String, DateTime<Utc>);
type EventKey = (String, DateTime<Utc>, String);

#[derive(Default)]
struct Tables {
    records: BTreeMap<RecordKey, TelemetryRecord>,
    zone_events: BTreeMap<EventKey, ZoneEvent>,
    states: HashMap<String, DeviceState>,
    zones: HashMap<String, Vec<SafeZone>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
}

/// Thread-safe in-memory store implementing every storage trait.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a safe zone.
    pub async fn put_zone(&self, zone: SafeZone) {
        let mut tables = self.tables.write().await;
        let zones = tables.zones.entry(zone.device_id.clone()).or_default();
        zones.retain(|z| z.zone_id != zone.zone_id);
        zones.push(zone);
    }

    /// Seeds a device-state row.
    pub async fn put_state(&self, state: DeviceState) {
        let mut tables = self.tables.write().await;
        tables.states.insert(state.device_id.clone(), state);
    }

    /// Makes every operation for the device fail until cleared.
    pub async fn fail_device(&self, device_id: &str) {
        self.tables.write().await.failing.insert(device_id.to_string());
    }

    pub async fn clear_failures(&self) {
        self.tables.write().await.failing.clear();
    }

    /// Delays every operation for the device.
    pub async fn delay_device(&self, device_id: &str, delay: Duration) {
        self.tables
            .write()
            .await
            .delays
            .insert(device_id.to_string(), delay);
    }

    pub async fn record_count(&self) -> usize {
        self.tables.read().await.records.len()
    }

    pub async fn records_for(&self, device_id: &str) -> Vec<TelemetryRecord> {
        self.tables
            .read()
            .await
            .records
            .values()
            .filter(|r| r.device_id == device_id)
            .cloned()
            .collect()
    }

    pub async fn zone_events_for(&self, device_id: &str) -> Vec<ZoneEvent> {
        self.tables
            .read()
            .await
            .zone_events
            .values()
            .filter(|e| e.device_id == device_id)
            .cloned()
            .collect()
    }

    /// Simulates the store's failure modes for a device.
    async fn check(&self, device_id: &str) -> DomainResult<()> {
        let (failing, delay) = {
            let tables = self.tables.read().await;
            (
                tables.failing.contains(device_id),
                tables.delays.get(device_id).copied(),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(anyhow!("simulated outage for device {device_id}").into());
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetryLog for InMemoryStore {
    async fn insert_record(&self, record: &TelemetryRecord) -> DomainResult<InsertOutcome> {
        self.check(&record.device_id).await?;

        let mut tables = self.tables.write().await;
        let key = (record.device_id.clone(), record.timestamp);
        if tables.records.contains_key(&key) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        tables.records.insert(key, record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_zone_event(&self, event: &ZoneEvent) -> DomainResult<InsertOutcome> {
        self.check(&event.device_id).await?;

        let mut tables = self.tables.write().await;
        let key = (event.device_id.clone(), event.timestamp, event.zone_id.clone());
        if tables.zone_events.contains_key(&key) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        tables.zone_events.insert(key, event.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn query_range(&self, query: &RangeQuery) -> DomainResult<LogPage> {
        self.check(&query.device_id).await?;

        let upper = match &query.exclusive_start {
            Some(cursor) => {
                let (_, ts) = decode_cursor(cursor)?;
                ts
            }
            None => query.end,
        };
        let inclusive_upper = query.exclusive_start.is_none();
        if upper < query.start {
            return Ok(LogPage::default());
        }

        let tables = self.tables.read().await;
        let mut candidates = tables
            .records
            .range((query.device_id.clone(), query.start)..=(query.device_id.clone(), upper))
            .rev()
            .map(|(_, r)| r)
            .filter(|r| inclusive_upper || r.timestamp < upper);

        let page_size = query.page_size.max(1) as usize;
        let examined: Vec<&TelemetryRecord> = candidates.by_ref().take(page_size).collect();
        let more = candidates.next().is_some();

        let last_evaluated_key = match examined.last() {
            Some(last) if more => Some(encode_cursor(&last.device_id, last.timestamp)),
            _ => None,
        };

        let items = examined
            .into_iter()
            .filter(|r| query.message_type.map_or(true, |t| r.message_type() == t))
            .cloned()
            .collect();

        Ok(LogPage {
            items,
            last_evaluated_key,
        })
    }

    async fn delete_expired(&self, now: DateTime<Utc>, batch_size: usize) -> DomainResult<u64> {
        let cutoff = now.timestamp();
        let retention = ChronoDuration::days(DEFAULT_RETENTION_DAYS);
        let mut tables = self.tables.write().await;

        let expired_records: Vec<RecordKey> = tables
            .records
            .iter()
            .filter(|(_, r)| r.ttl.is_some_and(|ttl| ttl < cutoff))
            .map(|(key, _)| key.clone())
            .take(batch_size)
            .collect();
        let expired_events: Vec<EventKey> = tables
            .zone_events
            .iter()
            .filter(|(_, e)| (e.detected_at + retention).timestamp() < cutoff)
            .map(|(key, _)| key.clone())
            .take(batch_size)
            .collect();

        let deleted = expired_records.len() + expired_events.len();
        for key in &expired_records {
            tables.records.remove(key);
        }
        for key in &expired_events {
            tables.zone_events.remove(key);
        }

        Ok(deleted as u64)
    }
}

#[async_trait]
impl DeviceStateStore for InMemoryStore {
    async fn get(&self, device_id: &str) -> DomainResult<Option<DeviceState>> {
        self.check(device_id).await?;
        Ok(self.tables.read().await.states.get(device_id).cloned())
    }

    async fn apply(&self, update: &DeviceStateUpdate) -> DomainResult<()> {
        let device_id = &update.delta.device_id;
        self.check(device_id).await?;

        let mut tables = self.tables.write().await;
        tables
            .states
            .entry(device_id.clone())
            .or_insert_with(|| DeviceState::new(device_id.clone(), update.delta.last_seen))
            .apply(update);
        Ok(())
    }
}

#[async_trait]
impl SafeZoneStore for InMemoryStore {
    async fn list_enabled(&self, device_id: &str) -> DomainResult<Vec<SafeZone>> {
        self.check(device_id).await?;
        Ok(self
            .tables
            .read()
            .await
            .zones
            .get(device_id)
            .map(|zones| zones.iter().filter(|z| z.enabled).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, DeviceStateDelta, MessageType, Reading};
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 3, 10, 0, 0).unwrap()
    }

    fn temp_record(device_id: &str, minute: i64) -> TelemetryRecord {
        TelemetryRecord {
            device_id: device_id.to_string(),
            timestamp: base() + ChronoDuration::minutes(minute),
            reading: Reading::Temp { temperature: 20.0 },
            device_ts: None,
            received_at: None,
            ttl: None,
        }
    }

    fn range(page_size: u32) -> RangeQuery {
        RangeQuery {
            device_id: "dev-1".to_string(),
            start: base(),
            end: base() + ChronoDuration::hours(1),
            message_type: None,
            page_size,
            exclusive_start: None,
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = InMemoryStore::new();
        let record = temp_record("dev-1", 0);

        assert_eq!(store.insert_record(&record).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(
            store.insert_record(&record).await.unwrap(),
            InsertOutcome::AlreadyPresent
        );
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_query_range_pages_newest_first() {
        let store = InMemoryStore::new();
        for minute in 0..5 {
            store.insert_record(&temp_record("dev-1", minute)).await.unwrap();
        }
        store.insert_record(&temp_record("dev-2", 1)).await.unwrap();

        let first = store.query_range(&range(3)).await.unwrap();
        let minutes: Vec<i64> = first
            .items
            .iter()
            .map(|r| (r.timestamp - base()).num_minutes())
            .collect();
        assert_eq!(minutes, vec![4, 3, 2]);
        assert!(first.last_evaluated_key.is_some());

        let mut next = range(3);
        next.exclusive_start = first.last_evaluated_key;
        let second = store.query_range(&next).await.unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(second.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_query_range_filters_after_page_limit() {
        let store = InMemoryStore::new();
        store.insert_record(&temp_record("dev-1", 0)).await.unwrap();
        let mut gnss = temp_record("dev-1", 1);
        gnss.reading = Reading::Gnss {
            lat: 1.0,
            lon: 2.0,
            accuracy: None,
        };
        store.insert_record(&gnss).await.unwrap();

        let mut query = range(1);
        query.message_type = Some(MessageType::Temp);
        let page = store.query_range(&query).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.last_evaluated_key.is_some());
    }

    #[tokio::test]
    async fn test_apply_creates_then_merges() {
        let store = InMemoryStore::new();
        let update = DeviceStateUpdate {
            delta: DeviceStateDelta {
                device_id: "dev-1".to_string(),
                last_seen: base(),
                updated_at: base(),
                last_location: None,
                last_ground_fix_location: None,
                last_temperature: None,
            },
            geofence: None,
        };

        store.apply(&update).await.unwrap();
        let state = store.get("dev-1").await.unwrap().unwrap();
        assert_eq!(state.last_seen, base());
        assert!(store.get("dev-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_enabled_skips_disabled() {
        let store = InMemoryStore::new();
        for (id, enabled) in [("a", true), ("b", false)] {
            store
                .put_zone(SafeZone {
                    device_id: "dev-1".to_string(),
                    zone_id: id.to_string(),
                    name: None,
                    center: Coordinates { lat: 0.0, lon: 0.0 },
                    radius_meters: 100.0,
                    enabled,
                })
                .await;
        }

        let zones = store.list_enabled("dev-1").await.unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].zone_id, "a");
    }

    #[tokio::test]
    async fn test_failing_device() {
        let store = InMemoryStore::new();
        store.fail_device("dev-1").await;

        tokio_test::assert_err!(store.insert_record(&temp_record("dev-1", 0)).await);
        tokio_test::assert_ok!(store.insert_record(&temp_record("dev-2", 0)).await);

        store.clear_failures().await;
        tokio_test::assert_ok!(store.insert_record(&temp_record("dev-1", 0)).await);
    }

    #[tokio::test]
    async fn test_delete_expired_honours_ttl() {
        let store = InMemoryStore::new();
        let now = base() + ChronoDuration::days(31);

        let mut expired = temp_record("dev-1", 0);
        expired.ttl = Some((base() + ChronoDuration::days(30)).timestamp());
        let mut live = temp_record("dev-1", 1);
        live.ttl = Some((now + ChronoDuration::days(1)).timestamp());
        let untimed = temp_record("dev-1", 2);
        for record in [&expired, &live, &untimed] {
            store.insert_record(record).await.unwrap();
        }

        assert_eq!(store.delete_expired(now, 100).await.unwrap(), 1);
        let remaining: Vec<_> = store
            .records_for("dev-1")
            .await
            .into_iter()
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(remaining, vec![live.timestamp, untimed.timestamp]);
        assert_eq!(store.delete_expired(now, 100).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_expired_respects_batch_size() {
        let store = InMemoryStore::new();
        for minute in 0..5 {
            let mut record = temp_record("dev-1", minute);
            record.ttl = Some(base().timestamp());
            store.insert_record(&record).await.unwrap();
        }

        let now = base() + ChronoDuration::days(1);
        assert_eq!(store.delete_expired(now, 2).await.unwrap(), 2);
        assert_eq!(store.record_count().await, 3);
        assert_eq!(store.delete_expired(now, 10).await.unwrap(), 3);
        assert_eq!(store.record_count().await, 0);
    }
}
