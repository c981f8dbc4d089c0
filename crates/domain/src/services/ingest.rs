//! Batch ingestion pipeline.
//!
//! One batch runs on one task with no internal parallelism, so merge order
//! is the array order. Every store call is bounded by a timeout, and a
//! failure for one record or one device never stops the rest of the batch.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::batch_reconciler::reconcile;
use super::geofence::{GeofenceEvaluation, GeofenceEvaluator};
use super::message_transformer::transform_value;
use super::notification::{NotificationResult, NotificationSink, ZoneAlert};
use crate::error::{DomainError, DomainResult};
use crate::models::{DeviceStateDelta, DeviceStateUpdate, MessageType, TelemetryRecord};
use crate::repository::{DeviceStateStore, InsertOutcome, SafeZoneStore, TelemetryLog};

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters describing one processed batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub received: usize,
    /// Messages that produced a record.
    pub processed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub discarded: usize,
    /// Devices whose state row was written.
    pub devices_updated: usize,
    pub zone_events: usize,
    pub alerts_sent: usize,
    /// Record writes, zone checks and device updates that failed.
    pub failures: usize,
    #[serde(skip)]
    pub discard_reasons: BTreeMap<&'static str, usize>,
}

/// Result of handling one device delta.
struct DeviceOutcome {
    zone_events: usize,
    alerts: Vec<ZoneAlert>,
    zone_check_failed: bool,
}

/// Drives a raw batch through transform, reconcile, storage, geofence
/// evaluation and notification.
pub struct IngestPipeline {
    log: Arc<dyn TelemetryLog>,
    states: Arc<dyn DeviceStateStore>,
    zones: Arc<dyn SafeZoneStore>,
    notifier: Arc<dyn NotificationSink>,
    evaluator: GeofenceEvaluator,
    store_timeout: Duration,
}

impl IngestPipeline {
    pub fn new(
        log: Arc<dyn TelemetryLog>,
        states: Arc<dyn DeviceStateStore>,
        zones: Arc<dyn SafeZoneStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            log,
            states,
            zones,
            notifier,
            evaluator: GeofenceEvaluator::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_evaluator(mut self, evaluator: GeofenceEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Processes one batch of raw messages.
    pub async fn process_batch(&self, messages: &[Value], now: DateTime<Utc>) -> BatchSummary {
        let mut summary = BatchSummary {
            received: messages.len(),
            ..Default::default()
        };

        let records = self.transform_all(messages, &mut summary);
        summary.processed = records.len();
        log_type_counts(&records);

        let deltas = reconcile(&records, now);

        for record in &records {
            match self.guard("insert_record", self.log.insert_record(record)).await {
                Ok(InsertOutcome::Inserted) => summary.inserted += 1,
                Ok(InsertOutcome::AlreadyPresent) => {
                    tracing::debug!(
                        device_id = %record.device_id,
                        timestamp = %record.timestamp,
                        "Duplicate record skipped"
                    );
                    summary.duplicates += 1;
                }
                Err(e) => {
                    tracing::error!(
                        device_id = %record.device_id,
                        timestamp = %record.timestamp,
                        error = %e,
                        "Failed to write record"
                    );
                    summary.failures += 1;
                }
            }
        }

        for delta in deltas {
            let device_id = delta.device_id.clone();
            match self.process_device(delta, now).await {
                Ok(outcome) => {
                    summary.devices_updated += 1;
                    summary.zone_events += outcome.zone_events;
                    if outcome.zone_check_failed {
                        summary.failures += 1;
                    }
                    summary.alerts_sent += self.publish_alerts(&outcome.alerts).await;
                }
                Err(e) => {
                    tracing::error!(
                        device_id = %device_id,
                        error = %e,
                        "Failed to update device state"
                    );
                    summary.failures += 1;
                }
            }
        }

        tracing::info!(
            received = summary.received,
            processed = summary.processed,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            discarded = summary.discarded,
            devices_updated = summary.devices_updated,
            zone_events = summary.zone_events,
            failures = summary.failures,
            "Batch processed"
        );

        summary
    }

    fn transform_all(&self, messages: &[Value], summary: &mut BatchSummary) -> Vec<TelemetryRecord> {
        let mut records = Vec::with_capacity(messages.len());

        for (index, message) in messages.iter().enumerate() {
            match transform_value(message) {
                Ok(record) => records.push(record),
                Err(discard) => {
                    if discard.is_expected() {
                        tracing::debug!(index = index, reason = %discard, "Message skipped");
                    } else {
                        tracing::warn!(index = index, reason = %discard, "Message discarded");
                    }
                    summary.discarded += 1;
                    *summary.discard_reasons.entry(discard.reason()).or_insert(0) += 1;
                }
            }
        }

        records
    }

    /// Geofence check, zone event log and state write for one device.
    ///
    /// A failed zone check is reported in the outcome and the delta is still
    /// written, leaving the stored safe-zone status as it was.
    async fn process_device(
        &self,
        delta: DeviceStateDelta,
        now: DateTime<Utc>,
    ) -> DomainResult<DeviceOutcome> {
        let (evaluation, zone_check_failed) = match self.check_zones(&delta, now).await {
            Ok(evaluation) => (evaluation, false),
            Err(e) => {
                tracing::error!(
                    device_id = %delta.device_id,
                    error = %e,
                    "Safe zone check failed, writing state without it"
                );
                (None, true)
            }
        };

        let update = DeviceStateUpdate {
            geofence: evaluation.as_ref().map(|e| e.safe_zone_state()),
            delta,
        };
        self.guard("apply_device_state", self.states.apply(&update))
            .await?;

        let events = evaluation.map(|e| e.events).unwrap_or_default();
        Ok(DeviceOutcome {
            zone_events: events.len(),
            alerts: events.iter().map(ZoneAlert::from).collect(),
            zone_check_failed,
        })
    }

    /// Evaluates a GNSS delta against the device's zones and logs the
    /// resulting transitions. Deltas without a GNSS fix yield `None`.
    async fn check_zones(
        &self,
        delta: &DeviceStateDelta,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<GeofenceEvaluation>> {
        let Some(location) = delta.gnss_location() else {
            return Ok(None);
        };

        let prior = self
            .guard("get_device_state", self.states.get(&delta.device_id))
            .await?
            .map(|state| state.safe_zone_status)
            .unwrap_or_default();
        let zones = self
            .guard("list_enabled_zones", self.zones.list_enabled(&delta.device_id))
            .await?;

        let Some(evaluation) = self
            .evaluator
            .evaluate(&delta.device_id, location, &zones, &prior, now)
        else {
            return Ok(None);
        };

        for event in &evaluation.events {
            let outcome = self
                .guard("insert_zone_event", self.log.insert_zone_event(event))
                .await?;
            tracing::info!(
                device_id = %event.device_id,
                zone_id = %event.zone_id,
                event_type = event.event_type.as_str(),
                duplicate = outcome == InsertOutcome::AlreadyPresent,
                "Zone transition detected"
            );
        }

        Ok(Some(evaluation))
    }

    /// Publishes alerts after the state write. Returns how many were sent.
    async fn publish_alerts(&self, alerts: &[ZoneAlert]) -> usize {
        let mut sent = 0;

        for alert in alerts {
            let result = tokio::time::timeout(self.store_timeout, self.notifier.publish(alert))
                .await
                .unwrap_or_else(|_| NotificationResult::Failed("publish timed out".to_string()));

            match result {
                NotificationResult::Sent => sent += 1,
                NotificationResult::Skipped => {}
                NotificationResult::Failed(reason) => {
                    tracing::warn!(
                        device_id = %alert.device_id,
                        zone_id = %alert.zone_id,
                        reason = %reason,
                        "Zone alert not delivered"
                    );
                }
            }
        }

        sent
    }

    async fn guard<T, F>(&self, operation: &'static str, fut: F) -> DomainResult<T>
    where
        F: Future<Output = DomainResult<T>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::Timeout {
                operation,
                timeout_ms: u64::try_from(self.store_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

fn log_type_counts(records: &[TelemetryRecord]) {
    let count = |t: MessageType| records.iter().filter(|r| r.message_type() == t).count();
    tracing::info!(
        records = records.len(),
        gnss = count(MessageType::Gnss),
        ground_fix = count(MessageType::GroundFix),
        temp = count(MessageType::Temp),
        "Transformed batch"
    );
}
