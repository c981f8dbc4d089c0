//! Domain models for the fleet telemetry backend.

pub mod device_state;
pub mod history;
pub mod safe_zone;
pub mod telemetry;
pub mod zone_event;

pub use device_state::{
    DeviceState, DeviceStateDelta, DeviceStateUpdate, DeviceSummary, Location, LocationSource,
    LocationView, SafeZoneState, Temperature,
};
pub use history::{HistoryEntry, HistoryQuery};
pub use safe_zone::{Coordinates, SafeZone, ZoneMembershipStatus};
pub use telemetry::{AppId, MessageType, RawMessage, RawPayload, Reading, TelemetryRecord};
pub use zone_event::{EventLocation, ZoneEvent, ZoneTransition};
