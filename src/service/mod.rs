//! Service layer for the tempo-hall session service
//!
//! This module contains the main application state, server wiring, and
//! health check logic for the production service.

pub mod app;
pub mod health;

pub use app::AppState;
pub use health::{HealthCheck, HealthReport, HealthStatus};
