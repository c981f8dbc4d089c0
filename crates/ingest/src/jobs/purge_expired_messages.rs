//! Deletes message log rows and zone events whose retention has passed.
//!
//! Neither backend expires items on its own, so the retention promised by
//! the `ttl` field is enforced here.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use domain::repository::TelemetryLog;

use super::scheduler::{Job, JobFrequency};

pub struct PurgeExpiredMessagesJob {
    log: Arc<dyn TelemetryLog>,
    batch_size: usize,
    interval_minutes: u64,
}

impl PurgeExpiredMessagesJob {
    pub fn new(log: Arc<dyn TelemetryLog>, batch_size: i64, interval_minutes: u64) -> Self {
        Self {
            log,
            batch_size: usize::try_from(batch_size.max(1)).unwrap_or(usize::MAX),
            interval_minutes: interval_minutes.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Job for PurgeExpiredMessagesJob {
    fn name(&self) -> &'static str {
        "purge_expired_messages"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.interval_minutes)
    }

    async fn execute(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let mut total: u64 = 0;

        loop {
            let deleted = self.log.delete_expired(now, self.batch_size).await?;
            total += deleted;

            if deleted == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }

        info!(deleted = total, "Purged expired message log rows");
        Ok(())
    }
}
