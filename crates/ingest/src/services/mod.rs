//! Outbound service integrations.

pub mod push;

pub use push::{notification_sink, HttpPushSink, PushError};
