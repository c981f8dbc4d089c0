//! Bounded, type-filtered history reads against the message log.
//!
//! The type filter is applied by the store after the key range, so a page
//! can hold fewer matching rows than requested. The planner keeps paging
//! until it has `limit` rows or the range runs out.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use validator::Validate;

use crate::error::DomainError;
use crate::models::{HistoryEntry, HistoryQuery, MessageType};
use crate::repository::{RangeQuery, TelemetryLog};
use shared::time::parse_iso8601;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;
/// Window used when `start` is omitted.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;
/// How far back `start` may reach.
pub const MAX_LOOKBACK_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum HistoryQueryError {
    #[error("Parameter '{0}' is invalid")]
    InvalidParameter(&'static str),

    #[error("Start time must be before end time")]
    InvalidTimeRange,

    #[error(transparent)]
    Store(#[from] DomainError),
}

impl HistoryQueryError {
    /// Stable error code for callers that expose these errors.
    pub fn code(&self) -> &'static str {
        match self {
            HistoryQueryError::InvalidParameter(_) => "INVALID_PARAMETER",
            HistoryQueryError::InvalidTimeRange => "INVALID_TIME_RANGE",
            HistoryQueryError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

/// A validated history query.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPlan {
    pub device_id: String,
    pub message_type: Option<MessageType>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: u32,
}

impl HistoryPlan {
    /// Validates raw parameters and fills in defaults relative to `now`.
    pub fn from_query(
        device_id: &str,
        query: &HistoryQuery,
        now: DateTime<Utc>,
    ) -> Result<Self, HistoryQueryError> {
        if query.validate().is_err() {
            return Err(HistoryQueryError::InvalidParameter("limit"));
        }

        let message_type = query
            .message_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| MessageType::parse(t).ok_or(HistoryQueryError::InvalidParameter("type")))
            .transpose()?;

        let start = parse_param(query.start.as_deref(), "start")?;
        let end = parse_param(query.end.as_deref(), "end")?;

        if let Some(start) = start {
            if start < now - Duration::days(MAX_LOOKBACK_DAYS) {
                return Err(HistoryQueryError::InvalidParameter("start"));
            }
        }

        let end = end.unwrap_or(now);
        let start = start.unwrap_or(end - Duration::hours(DEFAULT_WINDOW_HOURS));
        if start >= end {
            return Err(HistoryQueryError::InvalidTimeRange);
        }

        Ok(Self {
            device_id: device_id.to_string(),
            message_type,
            start,
            end,
            limit: query.limit.unwrap_or(DEFAULT_LIMIT),
        })
    }
}

fn parse_param(
    value: Option<&str>,
    name: &'static str,
) -> Result<Option<DateTime<Utc>>, HistoryQueryError> {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => parse_iso8601(v)
            .map(Some)
            .ok_or(HistoryQueryError::InvalidParameter(name)),
        None => Ok(None),
    }
}

/// History response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub device_id: String,
    pub history: Vec<HistoryEntry>,
    pub count: usize,
}

/// Runs history plans against the message log.
pub struct HistoryQueryPlanner {
    log: Arc<dyn TelemetryLog>,
}

impl HistoryQueryPlanner {
    pub fn new(log: Arc<dyn TelemetryLog>) -> Self {
        Self { log }
    }

    /// Validates and runs a query in one step.
    pub async fn history(
        &self,
        device_id: &str,
        query: &HistoryQuery,
        now: DateTime<Utc>,
    ) -> Result<HistoryResponse, HistoryQueryError> {
        let plan = HistoryPlan::from_query(device_id, query, now)?;
        let history = self.execute(&plan).await?;

        Ok(HistoryResponse {
            device_id: plan.device_id,
            count: history.len(),
            history,
        })
    }

    /// Collects up to `limit` rows, newest first.
    pub async fn execute(&self, plan: &HistoryPlan) -> Result<Vec<HistoryEntry>, HistoryQueryError> {
        let limit = plan.limit as usize;
        let mut range = RangeQuery {
            device_id: plan.device_id.clone(),
            start: plan.start,
            end: plan.end,
            message_type: plan.message_type,
            page_size: plan.limit,
            exclusive_start: None,
        };

        let mut entries = Vec::with_capacity(limit);
        let mut pages = 0u32;

        loop {
            let page = self.log.query_range(&range).await?;
            pages += 1;
            entries.extend(page.items.iter().map(HistoryEntry::from));

            if entries.len() >= limit {
                break;
            }
            match page.last_evaluated_key {
                Some(key) if range.exclusive_start.as_ref() != Some(&key) => {
                    range.exclusive_start = Some(key);
                }
                _ => break,
            }
        }

        entries.truncate(limit);

        tracing::debug!(
            device_id = %plan.device_id,
            message_type = ?plan.message_type,
            pages = pages,
            returned = entries.len(),
            "History query completed"
        );

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Reading, TelemetryRecord};
    use crate::repository::memory::InMemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 3, 12, 0, 0).unwrap()
    }

    fn query(message_type: Option<&str>, limit: Option<u32>) -> HistoryQuery {
        HistoryQuery {
            message_type: message_type.map(str::to_string),
            start: None,
            end: None,
            limit,
        }
    }

    fn reading(i: i64) -> Reading {
        match i % 3 {
            0 => Reading::Temp { temperature: 20.0 + i as f64 },
            1 => Reading::Gnss {
                lat: 35.68,
                lon: 139.77,
                accuracy: Some(5.0),
            },
            _ => Reading::GroundFix {
                lat: 35.47,
                lon: 139.60,
                accuracy: Some(200.0),
                fulfilled_with: None,
            },
        }
    }

    async fn seeded(rows: i64) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for i in 0..rows {
            let record = TelemetryRecord {
                device_id: "dev-1".to_string(),
                timestamp: now() - Duration::minutes(i + 1),
                reading: reading(i),
                device_ts: None,
                received_at: None,
                ttl: None,
            };
            store.insert_record(&record).await.unwrap();
        }
        store
    }

    #[test]
    fn test_defaults() {
        let plan = HistoryPlan::from_query("dev-1", &HistoryQuery::default(), now()).unwrap();
        assert_eq!(plan.limit, DEFAULT_LIMIT);
        assert_eq!(plan.end, now());
        assert_eq!(plan.start, now() - Duration::hours(24));
        assert!(plan.message_type.is_none());
    }

    #[test]
    fn test_invalid_type() {
        let err = HistoryPlan::from_query("dev-1", &query(Some("ZONE_EXIT"), None), now()).unwrap_err();
        assert!(matches!(err, HistoryQueryError::InvalidParameter("type")));
        assert_eq!(err.code(), "INVALID_PARAMETER");
    }

    #[test]
    fn test_invalid_limit() {
        for limit in [0, 1001] {
            let err = HistoryPlan::from_query("dev-1", &query(None, Some(limit)), now()).unwrap_err();
            assert!(matches!(err, HistoryQueryError::InvalidParameter("limit")));
        }
    }

    #[test]
    fn test_start_too_old() {
        let q = HistoryQuery {
            start: Some("2025-12-01T00:00:00.000Z".to_string()),
            ..Default::default()
        };
        let err = HistoryPlan::from_query("dev-1", &q, now()).unwrap_err();
        assert!(matches!(err, HistoryQueryError::InvalidParameter("start")));
    }

    #[test]
    fn test_unparseable_end() {
        let q = HistoryQuery {
            end: Some("tomorrow".to_string()),
            ..Default::default()
        };
        let err = HistoryPlan::from_query("dev-1", &q, now()).unwrap_err();
        assert!(matches!(err, HistoryQueryError::InvalidParameter("end")));
    }

    #[test]
    fn test_start_after_end() {
        let q = HistoryQuery {
            start: Some("2026-02-03T11:00:00Z".to_string()),
            end: Some("2026-02-03T10:00:00Z".to_string()),
            ..Default::default()
        };
        let err = HistoryPlan::from_query("dev-1", &q, now()).unwrap_err();
        assert!(matches!(err, HistoryQueryError::InvalidTimeRange));
        assert_eq!(err.code(), "INVALID_TIME_RANGE");
    }

    #[tokio::test]
    async fn test_paginates_until_limit_filled() {
        let store = seeded(30).await;
        let planner = HistoryQueryPlanner::new(store);

        let response = planner
            .history("dev-1", &query(Some("TEMP"), Some(5)), now())
            .await
            .unwrap();

        assert_eq!(response.count, 5);
        assert!(response
            .history
            .iter()
            .all(|e| e.message_type == MessageType::Temp));
        let timestamps: Vec<_> = response.history.iter().map(|e| e.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(timestamps, sorted);
    }

    #[tokio::test]
    async fn test_exactly_fifteen_rows() {
        let store = seeded(15).await;
        let planner = HistoryQueryPlanner::new(store);

        let response = planner
            .history("dev-1", &query(Some("TEMP"), Some(5)), now())
            .await
            .unwrap();
        assert_eq!(response.count, 5);
    }

    #[tokio::test]
    async fn test_range_exhausted_before_limit() {
        let store = seeded(6).await;
        let planner = HistoryQueryPlanner::new(store);

        let response = planner
            .history("dev-1", &query(Some("GNSS"), Some(5)), now())
            .await
            .unwrap();
        assert_eq!(response.count, 2);
    }

    #[tokio::test]
    async fn test_truncates_to_limit() {
        let store = seeded(10).await;
        let planner = HistoryQueryPlanner::new(store);

        let response = planner
            .history("dev-1", &query(None, Some(4)), now())
            .await
            .unwrap();
        assert_eq!(response.count, 4);
        assert_eq!(response.history[0].timestamp, now() - Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_entries_keep_nulls() {
        let store = seeded(3).await;
        let planner = HistoryQueryPlanner::new(store);

        let response = planner
            .history("dev-1", &query(None, None), now())
            .await
            .unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["count"], 3);
        for entry in json["history"].as_array().unwrap() {
            for field in ["lat", "lon", "accuracy", "temperature"] {
                assert!(entry.get(field).is_some(), "missing {field}");
            }
        }
    }

    #[tokio::test]
    async fn test_store_failure() {
        let store = seeded(3).await;
        store.fail_device("dev-1").await;
        let planner = HistoryQueryPlanner::new(store);

        let err = planner
            .history("dev-1", &query(None, None), now())
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryQueryError::Store(_)));
    }
}
