//! Persistence layer for the fleet telemetry backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - PostgreSQL implementations of the domain storage traits

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
