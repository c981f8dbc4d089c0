//! Device state repository for database operations.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use domain::models::{DeviceState, DeviceStateUpdate};
use domain::repository::DeviceStateStore;
use domain::DomainResult;

use crate::entities::DeviceStateEntity;
use crate::metrics::QueryTimer;

/// Repository for the `device_states` table.
#[derive(Clone)]
pub struct DeviceStateRepository {
    pool: PgPool,
}

impl DeviceStateRepository {
    /// Creates a new DeviceStateRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DeviceStateStore for DeviceStateRepository {
    async fn get(&self, device_id: &str) -> DomainResult<Option<DeviceState>> {
        let timer = QueryTimer::start("get_device_state");
        let result = sqlx::query_as::<_, DeviceStateEntity>(
            r#"
            SELECT device_id, last_seen, updated_at, last_location, last_ground_fix_location,
                   last_temperature, in_safe_zone, safe_zone_status, firmware_version
            FROM device_states
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);

        Ok(result.context("get device state")?.map(Into::into))
    }

    /// Field-level upsert: columns the update leaves empty keep their
    /// stored value, and the geofence columns only change when the update
    /// carries an evaluation.
    async fn apply(&self, update: &DeviceStateUpdate) -> DomainResult<()> {
        let delta = &update.delta;
        let has_geofence = update.geofence.is_some();
        let in_safe_zone = update.geofence.as_ref().map_or(false, |g| g.in_safe_zone);
        let safe_zone_status = update
            .geofence
            .as_ref()
            .map(|g| g.safe_zone_status.clone())
            .unwrap_or_default();

        let timer = QueryTimer::start("upsert_device_state");
        let result = sqlx::query(
            r#"
            INSERT INTO device_states (
                device_id, last_seen, updated_at, last_location, last_ground_fix_location,
                last_temperature, in_safe_zone, safe_zone_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (device_id) DO UPDATE SET
                last_seen = EXCLUDED.last_seen,
                updated_at = EXCLUDED.updated_at,
                last_location = COALESCE(EXCLUDED.last_location, device_states.last_location),
                last_ground_fix_location = COALESCE(
                    EXCLUDED.last_ground_fix_location,
                    device_states.last_ground_fix_location
                ),
                last_temperature = COALESCE(EXCLUDED.last_temperature, device_states.last_temperature),
                in_safe_zone = CASE WHEN $9 THEN EXCLUDED.in_safe_zone ELSE device_states.in_safe_zone END,
                safe_zone_status = CASE WHEN $9 THEN EXCLUDED.safe_zone_status ELSE device_states.safe_zone_status END
            "#,
        )
        .bind(&delta.device_id)
        .bind(delta.last_seen)
        .bind(delta.updated_at)
        .bind(delta.last_location.as_ref().map(Json))
        .bind(delta.last_ground_fix_location.as_ref().map(Json))
        .bind(delta.last_temperature.as_ref().map(Json))
        .bind(in_safe_zone)
        .bind(Json(safe_zone_status))
        .bind(has_geofence)
        .execute(&self.pool)
        .await;
        timer.finish(&result);

        result.context("upsert device state")?;
        Ok(())
    }
}
