//! Folds a batch of records into one state delta per device.
//!
//! Records are merged in batch order. GNSS fixes write `last_location`,
//! ground fixes only ever write `last_ground_fix_location`, temperatures
//! write `last_temperature`. `last_seen` and `updated_at` follow the last
//! merged record, not the latest timestamp.

use chrono::{DateTime, Utc};

use crate::models::{DeviceStateDelta, Reading, TelemetryRecord};

/// Merges records into deltas, ordered by each device's first appearance.
pub fn reconcile(records: &[TelemetryRecord], now: DateTime<Utc>) -> Vec<DeviceStateDelta> {
    let mut deltas: Vec<DeviceStateDelta> = Vec::new();

    for record in records {
        let idx = match deltas.iter().position(|d| d.device_id == record.device_id) {
            Some(idx) => idx,
            None => {
                deltas.push(DeviceStateDelta {
                    device_id: record.device_id.clone(),
                    last_seen: record.timestamp,
                    updated_at: now,
                    last_location: None,
                    last_ground_fix_location: None,
                    last_temperature: None,
                });
                deltas.len() - 1
            }
        };
        merge(&mut deltas[idx], record, now);
    }

    deltas
}

fn merge(delta: &mut DeviceStateDelta, record: &TelemetryRecord, now: DateTime<Utc>) {
    delta.last_seen = record.received_at.unwrap_or(record.timestamp);
    delta.updated_at = now;

    match &record.reading {
        Reading::Gnss { .. } => delta.last_location = record.location(),
        Reading::GroundFix { .. } => delta.last_ground_fix_location = record.location(),
        Reading::Temp { .. } => delta.last_temperature = record.temperature(),
    }
}
