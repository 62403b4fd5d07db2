//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the session
//! core, the WebSocket hub, and the monitoring endpoints into one running
//! server with graceful shutdown.

use crate::config::AppConfig;
use crate::error::{Result, SessionError};
use crate::metrics::{health_router, HealthState, MetricsCollector};
use crate::session::manager::{RandomSideAssigner, SessionCore};
use crate::transport::ws::{ws_handler, GatewayContext, WsHub};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Production application state
pub struct AppState {
    config: AppConfig,
    core: Arc<SessionCore>,
    hub: Arc<WsHub>,
    metrics: Arc<MetricsCollector>,
    started_at: Instant,
    shutdown_tx: broadcast::Sender<()>,
    server_task: Option<JoinHandle<()>>,
}

impl AppState {
    /// Initialize all service components without starting the server
    pub async fn new(config: AppConfig) -> Result<Self> {
        let hub = Arc::new(WsHub::new());
        let metrics = Arc::new(MetricsCollector::new()?);
        let core = Arc::new(SessionCore::with_parts(
            config.session.clone(),
            hub.clone(),
            Arc::new(RandomSideAssigner),
            metrics.clone(),
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        info!(
            "Initialized session core - tick: {}ms, seed policy: {}",
            config.session.clock_tick_ms, config.session.time_seed_policy
        );

        Ok(Self {
            config,
            core,
            hub,
            metrics,
            started_at: Instant::now(),
            shutdown_tx,
            server_task: None,
        })
    }

    /// Access the session core
    pub fn core(&self) -> Arc<SessionCore> {
        self.core.clone()
    }

    /// Access the WebSocket hub
    pub fn hub(&self) -> Arc<WsHub> {
        self.hub.clone()
    }

    /// Bind the gateway server and start serving connections
    pub async fn start(&mut self) -> Result<()> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.config.service.bind_host, self.config.service.port
        )
        .parse()
        .map_err(|_| SessionError::ConfigurationError {
            message: format!(
                "Invalid bind address {}:{}",
                self.config.service.bind_host, self.config.service.port
            ),
        })?;

        let gateway = Router::new()
            .route("/ws", get(ws_handler))
            .with_state(GatewayContext {
                core: self.core.clone(),
                hub: self.hub.clone(),
            });
        let monitoring = health_router(HealthState {
            core: self.core.clone(),
            metrics: self.metrics.clone(),
            started_at: self.started_at,
        });
        let app = gateway.merge(monitoring);

        let listener = TcpListener::bind(addr).await?;
        info!("Gateway listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    info!("Gateway shutdown signal received");
                })
                .await;
            if let Err(e) = result {
                error!("Gateway server error: {}", e);
            }
        });
        self.server_task = Some(task);

        Ok(())
    }

    /// Signal the server to stop and cancel all running clocks
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping service components...");
        let _ = self.shutdown_tx.send(());
        self.core.shutdown().await;

        if let Some(task) = self.server_task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("Gateway task ended abnormally: {}", e);
                }
            }
        }

        info!("Service stopped");
        Ok(())
    }

    /// Whether the gateway task is still running
    pub fn is_running(&self) -> bool {
        self.server_task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}
