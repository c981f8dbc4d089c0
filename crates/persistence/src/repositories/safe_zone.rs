//! Safe zone repository for database operations.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use validator::Validate;

use domain::models::SafeZone;
use domain::repository::SafeZoneStore;
use domain::DomainResult;

use crate::entities::SafeZoneEntity;
use crate::metrics::QueryTimer;

/// Repository for the `safe_zones` table. Zones are managed elsewhere;
/// this service only reads them.
#[derive(Clone)]
pub struct SafeZoneRepository {
    pool: PgPool,
}

impl SafeZoneRepository {
    /// Creates a new SafeZoneRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SafeZoneStore for SafeZoneRepository {
    async fn list_enabled(&self, device_id: &str) -> DomainResult<Vec<SafeZone>> {
        let timer = QueryTimer::start("list_enabled_safe_zones");
        let result = sqlx::query_as::<_, SafeZoneEntity>(
            r#"
            SELECT device_id, zone_id, name, center_lat, center_lon, radius_meters, enabled
            FROM safe_zones
            WHERE device_id = $1 AND enabled
            ORDER BY zone_id
            "#,
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);

        let zones = result
            .context("list enabled safe zones")?
            .into_iter()
            .map(SafeZone::from)
            .filter(|zone| match zone.validate() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        device_id = %zone.device_id,
                        zone_id = %zone.zone_id,
                        error = %e,
                        "Skipping invalid safe zone"
                    );
                    false
                }
            })
            .collect();

        Ok(zones)
    }
}
