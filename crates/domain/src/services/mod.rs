//! Domain services for the fleet telemetry backend.
//!
//! Services contain business logic that operates on domain models.

pub mod batch_reconciler;
pub mod geofence;
pub mod history_query;
pub mod ingest;
pub mod location_freshness;
pub mod message_transformer;
pub mod notification;

pub use batch_reconciler::reconcile;
pub use geofence::{haversine_distance, GeofenceEvaluation, GeofenceEvaluator};
pub use history_query::{HistoryPlan, HistoryQueryError, HistoryQueryPlanner, HistoryResponse};
pub use ingest::{BatchSummary, IngestPipeline};
pub use location_freshness::LocationFreshnessResolver;
pub use message_transformer::{transform, transform_value, Discard};
pub use notification::{
    AlertText, DisabledNotificationSink, MockNotificationSink, NotificationResult,
    NotificationSink, ZoneAlert,
};
