//! Upstream source adapter.
//!
//! The accounting package on the depot box exposes its vouchers over two
//! very different transports: a query gateway answering tabular rows and a
//! document gateway answering request/response envelopes. Which of them is
//! reachable varies per install, so the [`SourceRouter`] probes both at
//! startup (and on demand) and pins a [`ConnectionMethod`] for fetches.
//! The wire grammar of either channel is deliberately treated as opaque;
//! both yield untyped [`RawVoucher`] records for the sync pipeline to
//! validate.

pub mod document;
pub mod tabular;

pub use document::DocumentChannel;
pub use tabular::TabularChannel;

use crate::config::UpstreamConfig;
use crate::services::metrics::record_source_probe;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{info, instrument};

/// One voucher as the upstream handed it over, fields untyped.
#[derive(Debug, Clone, Default)]
pub struct RawVoucher {
    pub voucher_no: String,
    pub date: String,
    pub party: String,
    pub amount: String,
    pub narration: Option<String>,
}

/// Transport selected by probing, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMethod {
    None,
    Tabular,
    Document,
    Hybrid,
}

impl ConnectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tabular => "tabular",
            Self::Document => "document",
            Self::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no upstream channel is connected")]
    NotConnected,

    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("upstream response malformed: {0}")]
    Malformed(String),
}

/// Fetch seam between the sync pipeline and whatever transport is live.
#[async_trait]
pub trait VoucherSource: Send + Sync {
    async fn fetch_bills(&self, from: NaiveDate) -> Result<Vec<RawVoucher>, SourceError>;
    async fn fetch_receipts(&self, from: NaiveDate) -> Result<Vec<RawVoucher>, SourceError>;
}

/// Owns both channels and the probed connection method. Fetches prefer the
/// tabular channel whenever it is available.
pub struct SourceRouter {
    tabular: TabularChannel,
    document: DocumentChannel,
    method: RwLock<ConnectionMethod>,
}

impl SourceRouter {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            tabular: TabularChannel::new(
                config.tabular_endpoints.clone(),
                config.probe_timeout(),
                config.fetch_timeout(),
            ),
            document: DocumentChannel::new(
                config.document_endpoint.clone(),
                config.probe_timeout(),
                config.fetch_timeout(),
            ),
            method: RwLock::new(ConnectionMethod::None),
        }
    }

    /// Probe both channels and pin the resulting connection method. Runs at
    /// startup and again only on demand.
    #[instrument(skip(self))]
    pub async fn probe(&self) -> ConnectionMethod {
        let tabular_ok = self.tabular.probe().await;
        let document_ok = self.document.probe().await;

        let method = match (tabular_ok, document_ok) {
            (true, true) => ConnectionMethod::Hybrid,
            (true, false) => ConnectionMethod::Tabular,
            (false, true) => ConnectionMethod::Document,
            (false, false) => ConnectionMethod::None,
        };

        *self.method.write().expect("method lock poisoned") = method;
        record_source_probe(method.as_str());
        info!(method = method.as_str(), "Upstream probe complete");

        method
    }

    /// The method pinned by the last probe.
    pub fn method(&self) -> ConnectionMethod {
        *self.method.read().expect("method lock poisoned")
    }
}

#[async_trait]
impl VoucherSource for SourceRouter {
    async fn fetch_bills(&self, from: NaiveDate) -> Result<Vec<RawVoucher>, SourceError> {
        match self.method() {
            ConnectionMethod::None => Err(SourceError::NotConnected),
            ConnectionMethod::Tabular | ConnectionMethod::Hybrid => {
                self.tabular.fetch_bills(from).await
            }
            ConnectionMethod::Document => self.document.fetch_bills(from).await,
        }
    }

    async fn fetch_receipts(&self, from: NaiveDate) -> Result<Vec<RawVoucher>, SourceError> {
        match self.method() {
            ConnectionMethod::None => Err(SourceError::NotConnected),
            ConnectionMethod::Tabular | ConnectionMethod::Hybrid => {
                self.tabular.fetch_receipts(from).await
            }
            ConnectionMethod::Document => self.document.fetch_receipts(from).await,
        }
    }
}
