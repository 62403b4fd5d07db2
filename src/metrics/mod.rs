//! Metrics and monitoring for the tempo-hall session service
//!
//! This module provides Prometheus metrics collection and the HTTP
//! monitoring endpoints served next to the WebSocket gateway.

pub mod collector;
pub mod health;

pub use collector::{ClockMetrics, LobbyMetrics, MetricsCollector, ServiceMetrics};
pub use health::{router as health_router, HealthState};
