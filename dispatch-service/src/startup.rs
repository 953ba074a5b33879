//! Application startup and lifecycle management.

use crate::config::DispatchConfig;
use crate::handlers;
use crate::services::release::ReleaseCoordinator;
use crate::services::sessions::Sessions;
use crate::services::sync::{SyncEngine, run_scheduler};
use crate::services::upstream::SourceRouter;
use crate::services::{Database, get_metrics, init_metrics};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: DispatchConfig,
    pub db: Database,
    pub source: Arc<SourceRouter>,
    pub sync: Arc<SyncEngine>,
    pub sessions: Sessions,
    pub releases: ReleaseCoordinator,
}

/// Health check endpoint for liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "dispatch-service",
                "version": env!("CARGO_PKG_VERSION"),
                "source_method": state.source.method().as_str()
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "dispatch-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: DispatchConfig) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to open dispatch store");
            AppError::DatabaseError(anyhow::anyhow!("{e}"))
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            AppError::DatabaseError(anyhow::anyhow!("{e}"))
        })?;

        let source = Arc::new(SourceRouter::new(&config.upstream));
        let method = source.probe().await;
        tracing::info!(method = method.as_str(), "Initial upstream probe");

        let sync = Arc::new(SyncEngine::new(
            db.clone(),
            source.clone(),
            config.sync.window_days,
        ));
        let sessions = Sessions::new(db.clone(), config.session.variance_threshold_paise);
        let releases = ReleaseCoordinator::new(db.clone(), config.release.manager_pin.clone());

        let state = AppState {
            config: config.clone(),
            db,
            source,
            sync,
            sessions,
            releases,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Dispatch service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped: the HTTP surface plus the
    /// background sync scheduler.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state.clone());

        let scheduler = tokio::spawn(run_scheduler(
            self.state.sync.clone(),
            self.state.config.sync.interval_secs,
        ));

        tracing::info!(
            service = "dispatch-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            sync_interval_secs = self.state.config.sync.interval_secs,
            "Service ready to accept connections"
        );

        let result = axum::serve(self.listener, router).await;
        scheduler.abort();

        result.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/sync/run", post(handlers::sync::run_sync))
        .route("/sync/status", get(handlers::sync::sync_status))
        .route("/sync/probe", post(handlers::sync::probe_source))
        .route("/bills/:voucher_no", get(handlers::bills::get_bill))
        .route("/dashboard", get(handlers::bills::dashboard))
        .route("/releases/self", post(handlers::releases::release_self))
        .route(
            "/releases/transporter",
            post(handlers::releases::release_transporter),
        )
        .route(
            "/releases/:bill_no/delivery",
            post(handlers::releases::confirm_delivery),
        )
        .route("/gate-log", post(handlers::releases::log_gate_exit))
        .route("/sessions", post(handlers::sessions::open_session))
        .route("/sessions/:id", get(handlers::sessions::get_session))
        .route(
            "/sessions/:id/close",
            post(handlers::sessions::close_session),
        )
        .route(
            "/sessions/:id/approve",
            post(handlers::sessions::approve_session),
        )
        .route(
            "/sessions/:id/petty-cash",
            post(handlers::sessions::record_petty_cash),
        )
        .route(
            "/sessions/:id/adjustments",
            post(handlers::sessions::record_adjustment),
        )
        .route(
            "/payment-hints",
            post(handlers::sessions::record_payment_hint),
        )
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
