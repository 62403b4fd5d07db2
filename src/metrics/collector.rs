//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the tempo-hall session
//! service using Prometheus metrics.

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Main metrics collector for the session service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Lobby and game metrics
    lobby_metrics: LobbyMetrics,

    /// Clock engine metrics
    clock_metrics: ClockMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Inbound client events processed, by event name
    pub events_total: IntCounterVec,
}

/// Lobby and game metrics
#[derive(Clone)]
pub struct LobbyMetrics {
    /// Currently connected users
    pub connected_users: IntGauge,

    /// Total challenges issued
    pub challenges_issued_total: IntCounter,

    /// Total games started
    pub games_started_total: IntCounter,

    /// Total games ended, by reason
    pub games_ended_total: IntCounterVec,

    /// Total connection losses handled
    pub disconnects_total: IntCounter,
}

/// Clock engine metrics
#[derive(Clone)]
pub struct ClockMetrics {
    /// Currently running countdown clocks
    pub active_clocks: IntGauge,

    /// Total clocks that counted down to exactly zero
    pub clocks_expired_total: IntCounter,
}

impl MetricsCollector {
    /// Create a collector with all metrics registered on a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let service_metrics = ServiceMetrics {
            uptime_seconds: IntGauge::with_opts(Opts::new(
                "service_uptime_seconds",
                "Service uptime in seconds",
            ))?,
            events_total: IntCounterVec::new(
                Opts::new("client_events_total", "Inbound client events processed"),
                &["event"],
            )?,
        };

        let lobby_metrics = LobbyMetrics {
            connected_users: IntGauge::with_opts(Opts::new(
                "connected_users",
                "Currently connected users",
            ))?,
            challenges_issued_total: IntCounter::with_opts(Opts::new(
                "challenges_issued_total",
                "Total challenges issued",
            ))?,
            games_started_total: IntCounter::with_opts(Opts::new(
                "games_started_total",
                "Total games started",
            ))?,
            games_ended_total: IntCounterVec::new(
                Opts::new("games_ended_total", "Total games ended"),
                &["reason"],
            )?,
            disconnects_total: IntCounter::with_opts(Opts::new(
                "disconnects_total",
                "Total connection losses handled",
            ))?,
        };

        let clock_metrics = ClockMetrics {
            active_clocks: IntGauge::with_opts(Opts::new(
                "active_clocks",
                "Currently running countdown clocks",
            ))?,
            clocks_expired_total: IntCounter::with_opts(Opts::new(
                "clocks_expired_total",
                "Total clocks that reached zero",
            ))?,
        };

        registry.register(Box::new(service_metrics.uptime_seconds.clone()))?;
        registry.register(Box::new(service_metrics.events_total.clone()))?;
        registry.register(Box::new(lobby_metrics.connected_users.clone()))?;
        registry.register(Box::new(lobby_metrics.challenges_issued_total.clone()))?;
        registry.register(Box::new(lobby_metrics.games_started_total.clone()))?;
        registry.register(Box::new(lobby_metrics.games_ended_total.clone()))?;
        registry.register(Box::new(lobby_metrics.disconnects_total.clone()))?;
        registry.register(Box::new(clock_metrics.active_clocks.clone()))?;
        registry.register(Box::new(clock_metrics.clocks_expired_total.clone()))?;

        Ok(Self {
            registry,
            service_metrics,
            lobby_metrics,
            clock_metrics,
        })
    }

    /// Access the underlying Prometheus registry (for the /metrics endpoint)
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Direct access to service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Direct access to lobby metrics
    pub fn lobby(&self) -> &LobbyMetrics {
        &self.lobby_metrics
    }

    /// Direct access to clock metrics
    pub fn clock(&self) -> &ClockMetrics {
        &self.clock_metrics
    }

    // High-level recording API used by the session core

    pub fn record_event(&self, event: &str) {
        self.service_metrics
            .events_total
            .with_label_values(&[event])
            .inc();
    }

    pub fn set_connected_users(&self, count: usize) {
        self.lobby_metrics.connected_users.set(count as i64);
    }

    pub fn record_challenge_issued(&self) {
        self.lobby_metrics.challenges_issued_total.inc();
    }

    pub fn record_game_started(&self) {
        self.lobby_metrics.games_started_total.inc();
    }

    pub fn record_game_ended(&self, reason: &str) {
        self.lobby_metrics
            .games_ended_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_disconnect(&self) {
        self.lobby_metrics.disconnects_total.inc();
    }

    pub fn set_active_clocks(&self, count: usize) {
        self.clock_metrics.active_clocks.set(count as i64);
    }

    pub fn record_clock_expired(&self) {
        self.clock_metrics.clocks_expired_total.inc();
    }

    pub fn set_uptime(&self, seconds: u64) {
        self.service_metrics.uptime_seconds.set(seconds as i64);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        // Registration on a brand-new registry cannot collide
        Self::new().expect("metrics registration on a fresh registry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_registers_metric_families() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_event("move");
        collector.set_connected_users(3);
        collector.record_game_started();
        collector.record_game_ended("resign");
        collector.set_active_clocks(1);
        collector.record_clock_expired();

        let families = collector.registry().gather();
        let names: Vec<String> = families.iter().map(|f| f.get_name().to_string()).collect();

        assert!(names.iter().any(|n| n.contains("client_events")));
        assert!(names.iter().any(|n| n.contains("connected_users")));
        assert!(names.iter().any(|n| n.contains("games_started")));
        assert!(names.iter().any(|n| n.contains("active_clocks")));
    }

    #[test]
    fn test_gauges_track_latest_value() {
        let collector = MetricsCollector::new().unwrap();
        collector.set_active_clocks(2);
        collector.set_active_clocks(0);
        assert_eq!(collector.clock().active_clocks.get(), 0);

        collector.set_connected_users(5);
        assert_eq!(collector.lobby().connected_users.get(), 5);
    }
}
