//! Storage traits for the telemetry backend.
//!
//! The persistence crate implements these against PostgreSQL; [`memory`]
//! holds an in-process implementation used by tests and the `memory`
//! storage backend.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DomainResult;
use crate::models::{
    DeviceState, DeviceStateUpdate, MessageType, SafeZone, TelemetryRecord, ZoneEvent,
};

/// Result of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

/// A time-range read against the message log, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub device_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Applied after the key range, so a page may hold fewer matches than `page_size`.
    pub message_type: Option<MessageType>,
    /// Rows examined per page, counted before the type filter.
    pub page_size: u32,
    /// Cursor from the previous page's `last_evaluated_key`.
    pub exclusive_start: Option<String>,
}

/// One page of a range query.
#[derive(Debug, Clone, Default)]
pub struct LogPage {
    pub items: Vec<TelemetryRecord>,
    /// Present when more rows may remain in the range.
    pub last_evaluated_key: Option<String>,
}

/// Durable, append-only message log.
#[async_trait]
pub trait TelemetryLog: Send + Sync {
    /// Inserts a record unless one with the same `(device_id, timestamp)` exists.
    async fn insert_record(&self, record: &TelemetryRecord) -> DomainResult<InsertOutcome>;

    /// Inserts a zone event unless it was already logged.
    async fn insert_zone_event(&self, event: &ZoneEvent) -> DomainResult<InsertOutcome>;

    /// Reads one page of a time-range query.
    async fn query_range(&self, query: &RangeQuery) -> DomainResult<LogPage>;

    /// Deletes up to `batch_size` records and up to `batch_size` zone events
    /// whose retention ended before `now`. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>, batch_size: usize) -> DomainResult<u64>;
}

/// Per-device live-state rows.
#[async_trait]
pub trait DeviceStateStore: Send + Sync {
    async fn get(&self, device_id: &str) -> DomainResult<Option<DeviceState>>;

    /// Upserts the row, leaving fields absent from the update untouched.
    async fn apply(&self, update: &DeviceStateUpdate) -> DomainResult<()>;
}

/// Read-only access to configured safe zones.
#[async_trait]
pub trait SafeZoneStore: Send + Sync {
    async fn list_enabled(&self, device_id: &str) -> DomainResult<Vec<SafeZone>>;
}
