//! Shared utilities and common types for the fleet telemetry backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Timestamp formatting and lenient parsing (ISO-8601, millisecond precision)
//! - Payload signing for outbound notifications
//! - Opaque pagination cursors
//! - Common validation logic

pub mod crypto;
pub mod pagination;
pub mod time;
pub mod validation;
