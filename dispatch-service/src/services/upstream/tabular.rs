//! Query-gateway channel.
//!
//! The gateway accepts a query string over HTTP and answers header-less
//! rows with pipe-separated fields. Installs differ in which endpoint
//! variant the gateway listens on, so probing walks the configured variants
//! in order and pins the first one that answers the identity query.

use super::{RawVoucher, SourceError};
use chrono::NaiveDate;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

const PROBE_QUERY: &str = "SELECT $Name FROM Company";
const BILLS_TABLE: &str = "SalesVouchers";
const RECEIPTS_TABLE: &str = "ReceiptVouchers";

pub struct TabularChannel {
    client: Client,
    endpoints: Vec<String>,
    active: RwLock<Option<String>>,
    probe_timeout: Duration,
    fetch_timeout: Duration,
}

impl TabularChannel {
    pub fn new(endpoints: Vec<String>, probe_timeout: Duration, fetch_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoints,
            active: RwLock::new(None),
            probe_timeout,
            fetch_timeout,
        }
    }

    /// Try each endpoint variant in order; pin the first that answers the
    /// probe query.
    pub async fn probe(&self) -> bool {
        for endpoint in &self.endpoints {
            match self.run_query(endpoint, PROBE_QUERY, self.probe_timeout).await {
                Ok(_) => {
                    info!(endpoint = %endpoint, "Tabular channel connected");
                    *self.active.write().expect("endpoint lock poisoned") =
                        Some(endpoint.clone());
                    return true;
                }
                Err(e) => {
                    debug!(endpoint = %endpoint, error = %e, "Tabular probe variant failed");
                }
            }
        }

        *self.active.write().expect("endpoint lock poisoned") = None;
        false
    }

    /// The endpoint pinned by the last successful probe.
    pub fn active_endpoint(&self) -> Option<String> {
        self.active.read().expect("endpoint lock poisoned").clone()
    }

    pub async fn fetch_bills(&self, from: NaiveDate) -> Result<Vec<RawVoucher>, SourceError> {
        self.fetch(BILLS_TABLE, from).await
    }

    pub async fn fetch_receipts(&self, from: NaiveDate) -> Result<Vec<RawVoucher>, SourceError> {
        self.fetch(RECEIPTS_TABLE, from).await
    }

    async fn fetch(&self, table: &str, from: NaiveDate) -> Result<Vec<RawVoucher>, SourceError> {
        let endpoint = self.active_endpoint().ok_or(SourceError::NotConnected)?;
        let query = format!(
            "SELECT $VoucherNumber, $Date, $PartyLedgerName, $Amount, $Narration \
             FROM {} WHERE $Date >= '{}'",
            table,
            from.format("%Y%m%d")
        );

        let body = self.run_query(&endpoint, &query, self.fetch_timeout).await?;
        Ok(parse_rows(&body))
    }

    async fn run_query(
        &self,
        endpoint: &str,
        query: &str,
        timeout: Duration,
    ) -> Result<String, SourceError> {
        let url = format!("{}/query", endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .header(CONTENT_TYPE, "text/plain")
            .body(query.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        Ok(response.text().await?)
    }
}

/// Parse gateway rows. Blank lines and rows with too few columns are wire
/// noise, not vouchers; they are dropped here with a log line. Field-level
/// validation happens in the sync pipeline.
fn parse_rows(body: &str) -> Vec<RawVoucher> {
    let mut vouchers = Vec::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < 4 {
            warn!(line = %line, "Dropping short gateway row");
            continue;
        }
        let narration = fields
            .get(4)
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(|n| n.to_string());
        vouchers.push(RawVoucher {
            voucher_no: fields[0].trim().to_string(),
            date: fields[1].trim().to_string(),
            party: fields[2].trim().to_string(),
            amount: fields[3].trim().to_string(),
            narration,
        });
    }
    vouchers
}
