//! Configuration module for dispatch-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub sync: SyncConfig,
    pub release: ReleaseConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Endpoints and timeouts for the two upstream transports.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Query-gateway endpoint variants, tried in order during a probe.
    pub tabular_endpoints: Vec<String>,
    /// Document-gateway endpoint.
    pub document_endpoint: String,
    pub probe_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Seconds between scheduled sync cycles.
    pub interval_secs: u64,
    /// Trailing window, in days, that each fetch covers.
    pub window_days: i64,
}

#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    /// PIN a manager types to approve releasing a part-paid bill.
    pub manager_pin: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Absolute cash variance above which a session close is flagged for
    /// supervisory approval.
    pub variance_threshold_paise: i64,
}

impl DispatchConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "dispatch-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            upstream: UpstreamConfig {
                tabular_endpoints: env::var("UPSTREAM_TABULAR_ENDPOINTS")
                    .unwrap_or_else(|_| {
                        "http://localhost:9000,http://localhost:9999".to_string()
                    })
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                document_endpoint: env::var("UPSTREAM_DOCUMENT_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:9002".to_string()),
                probe_timeout_secs: env::var("UPSTREAM_PROBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
                fetch_timeout_secs: env::var("UPSTREAM_FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            sync: SyncConfig {
                interval_secs: env::var("SYNC_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
                window_days: env::var("SYNC_WINDOW_DAYS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            release: ReleaseConfig {
                manager_pin: Secret::new(env::var("MANAGER_PIN").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("MANAGER_PIN is required"))
                })?),
            },
            session: SessionConfig {
                variance_threshold_paise: env::var("VARIANCE_THRESHOLD_PAISE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10_000),
            },
        })
    }
}
