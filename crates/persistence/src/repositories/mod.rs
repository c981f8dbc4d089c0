//! Repository implementations of the domain storage traits.

pub mod device_state;
pub mod safe_zone;
pub mod telemetry_log;

pub use device_state::DeviceStateRepository;
pub use safe_zone::SafeZoneRepository;
pub use telemetry_log::TelemetryLogRepository;
