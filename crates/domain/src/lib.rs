//! Domain layer for the fleet telemetry backend.
//!
//! This crate contains:
//! - Domain models (telemetry records, device state, safe zones, zone events)
//! - Ingestion and read-path services
//! - Storage traits implemented by the persistence layer
//! - Domain error types

pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use error::{DomainError, DomainResult};
