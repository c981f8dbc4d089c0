//! Background job scheduler and job implementations.

mod pool_metrics;
mod purge_expired_messages;
mod scheduler;

pub use pool_metrics::PoolMetricsJob;
pub use purge_expired_messages::PurgeExpiredMessagesJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
