//! Database entity definitions.

pub mod device_message;
pub mod device_state;
pub mod safe_zone;

pub use device_message::DeviceMessageEntity;
pub use device_state::DeviceStateEntity;
pub use safe_zone::SafeZoneEntity;
