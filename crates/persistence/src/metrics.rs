//! Query timing and pool gauges for the PostgreSQL stores.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Records one query's latency under `database_query_duration_seconds`.
pub fn record_query_duration(query_name: &str, outcome: &'static str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name.to_string(),
        "outcome" => outcome
    )
    .record(duration_secs);
}

/// Publishes pool size, idle and in-use connection gauges.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("database_connections_total").set(size as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_active").set(size.saturating_sub(idle) as f64);
}

/// Counts rows removed by the expiry sweep.
pub fn record_rows_purged(table: &'static str, rows: u64) {
    counter!("database_rows_purged_total", "table" => table).increment(rows);
}

/// Times a query from construction until [`QueryTimer::finish`].
///
/// ```ignore
/// let timer = QueryTimer::start("get_device_state");
/// let result = sqlx::query_as::<_, DeviceStateEntity>(...).fetch_optional(&pool).await;
/// timer.finish(&result);
/// ```
pub struct QueryTimer {
    query_name: String,
    start: Instant,
}

impl QueryTimer {
    pub fn start(query_name: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            start: Instant::now(),
        }
    }

    /// Records the elapsed time labelled with the query's outcome.
    pub fn finish<T, E>(self, result: &Result<T, E>) {
        let outcome = if result.is_ok() { "ok" } else { "error" };
        record_query_duration(&self.query_name, outcome, self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_timer_keeps_name() {
        let timer = QueryTimer::start("insert_device_message");
        assert_eq!(timer.query_name, "insert_device_message");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        QueryTimer::start("query_device_messages").finish(&Ok::<_, ()>(()));
        QueryTimer::start("query_device_messages").finish(&Err::<(), _>("timeout"));
        record_rows_purged("device_messages", 3);
    }
}
