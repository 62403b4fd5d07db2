//! Health check logic for the session service

use crate::error::Result;
use crate::session::manager::{CoreOverview, SessionCore};
use serde::Serialize;
use std::sync::Arc;

/// Overall service health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health report exposed on the /health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub overview: CoreOverview,
}

/// Health check runner
pub struct HealthCheck;

impl HealthCheck {
    /// Probe the session core for internal consistency.
    ///
    /// A game in progress holds at most one running clock, so more active
    /// clocks than paired players can account for means the clock table
    /// has leaked; that is reported as degraded rather than failing the
    /// whole service.
    pub async fn check(core: Arc<SessionCore>) -> Result<HealthReport> {
        let overview = core.overview().await;

        let max_expected_clocks = overview.users_in_play / 2;
        let status = if overview.active_clocks > max_expected_clocks {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Ok(HealthReport { status, overview })
    }
}
