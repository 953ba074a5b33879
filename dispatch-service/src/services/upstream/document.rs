//! Document-gateway channel.
//!
//! The gateway exchanges XML-ish envelopes on a single endpoint. Responses
//! carry voucher blocks whose fields are lifted out with regular
//! expressions; the envelope grammar beyond that is opaque and varies by
//! upstream version, which is why no structural parse is attempted.

use super::{RawVoucher, SourceError};
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, info};

static VOUCHER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<VOUCHER>(.*?)</VOUCHER>").expect("VOUCHER_RE"));
static VCHNO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<VCHNO>(.*?)</VCHNO>").expect("VCHNO_RE"));
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<DATE>(.*?)</DATE>").expect("DATE_RE"));
static PARTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<PARTY>(.*?)</PARTY>").expect("PARTY_RE"));
static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<AMOUNT>(.*?)</AMOUNT>").expect("AMOUNT_RE"));
static NARRATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<NARRATION>(.*?)</NARRATION>").expect("NARRATION_RE"));
static ERROR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(?:ERROR|LINEERROR)>(.*?)</").expect("ERROR_RE"));

pub struct DocumentChannel {
    client: Client,
    endpoint: String,
    probe_timeout: Duration,
    fetch_timeout: Duration,
}

impl DocumentChannel {
    pub fn new(endpoint: String, probe_timeout: Duration, fetch_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            probe_timeout,
            fetch_timeout,
        }
    }

    /// Send a minimal well-formed envelope; any structured non-error
    /// response means the gateway is live.
    pub async fn probe(&self) -> bool {
        let envelope = request_envelope("CompanyInfo", "");
        match self.exchange(&envelope, self.probe_timeout).await {
            Ok(body) => {
                let ok = body.to_uppercase().contains("<ENVELOPE") && !ERROR_RE.is_match(&body);
                if ok {
                    info!(endpoint = %self.endpoint, "Document channel connected");
                } else {
                    debug!(endpoint = %self.endpoint, "Document probe got an error envelope");
                }
                ok
            }
            Err(e) => {
                debug!(endpoint = %self.endpoint, error = %e, "Document probe failed");
                false
            }
        }
    }

    pub async fn fetch_bills(&self, from: NaiveDate) -> Result<Vec<RawVoucher>, SourceError> {
        self.fetch("Sales", from).await
    }

    pub async fn fetch_receipts(&self, from: NaiveDate) -> Result<Vec<RawVoucher>, SourceError> {
        self.fetch("Receipt", from).await
    }

    async fn fetch(
        &self,
        voucher_type: &str,
        from: NaiveDate,
    ) -> Result<Vec<RawVoucher>, SourceError> {
        let body = format!(
            "<FROMDATE>{}</FROMDATE><TODATE>{}</TODATE><VOUCHERTYPE>{}</VOUCHERTYPE>",
            from.format("%Y%m%d"),
            Utc::now().date_naive().format("%Y%m%d"),
            voucher_type
        );
        let envelope = request_envelope("Vouchers", &body);
        let response = self.exchange(&envelope, self.fetch_timeout).await?;

        if let Some(err) = ERROR_RE
            .captures(&response)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
        {
            return Err(SourceError::Malformed(err));
        }

        Ok(parse_envelope(&response))
    }

    async fn exchange(&self, envelope: &str, timeout: Duration) -> Result<String, SourceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .header(CONTENT_TYPE, "text/xml")
            .body(envelope.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        Ok(response.text().await?)
    }
}

fn request_envelope(id: &str, body: &str) -> String {
    format!(
        "<ENVELOPE><HEADER><VERSION>1</VERSION><REQTYPE>EXPORT</REQTYPE>\
         <ID>{}</ID></HEADER><BODY>{}</BODY></ENVELOPE>",
        id, body
    )
}

/// Extract voucher blocks from a response envelope. Blocks with none of the
/// core fields are skipped as noise; partially filled blocks flow through so
/// the pipeline can count them as malformed.
fn parse_envelope(body: &str) -> Vec<RawVoucher> {
    let mut vouchers = Vec::new();
    for block in VOUCHER_RE.captures_iter(body) {
        let inner = block.get(1).map(|m| m.as_str()).unwrap_or_default();
        let voucher = RawVoucher {
            voucher_no: tag_text(&VCHNO_RE, inner),
            date: tag_text(&DATE_RE, inner),
            party: tag_text(&PARTY_RE, inner),
            amount: tag_text(&AMOUNT_RE, inner),
            narration: Some(tag_text(&NARRATION_RE, inner)).filter(|n| !n.is_empty()),
        };
        if voucher.voucher_no.is_empty()
            && voucher.party.is_empty()
            && voucher.amount.is_empty()
            && voucher.date.is_empty()
        {
            debug!("Skipping empty voucher block");
            continue;
        }
        vouchers.push(voucher);
    }
    vouchers
}

fn tag_text(re: &Regex, block: &str) -> String {
    re.captures(block)
        .and_then(|c| c.get(1))
        .map(|m| unescape(m.as_str().trim()))
        .unwrap_or_default()
}

/// Minimal entity decoding for the handful the gateway emits.
fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_voucher_blocks() {
        let body = "<ENVELOPE><BODY>\
            <VOUCHER><VCHNO>SV-1</VCHNO><DATE>20250801</DATE>\
            <PARTY>Sharma &amp; Sons</PARTY><AMOUNT>1500.00</AMOUNT>\
            <NARRATION>against BILL:SV-0</NARRATION></VOUCHER>\
            <VOUCHER><VCHNO>SV-2</VCHNO><DATE>20250802</DATE>\
            <PARTY>Bharat Mills</PARTY><AMOUNT>250.50</AMOUNT></VOUCHER>\
            </BODY></ENVELOPE>";
        let rows = parse_envelope(body);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].voucher_no, "SV-1");
        assert_eq!(rows[0].party, "Sharma & Sons");
        assert_eq!(rows[0].narration.as_deref(), Some("against BILL:SV-0"));
        assert_eq!(rows[1].narration, None);
    }

    #[test]
    fn tag_matching_is_case_insensitive() {
        let body = "<voucher><vchno>SV-3</vchno><date>20250803</date>\
                    <party>Acme</party><amount>10.00</amount></voucher>";
        let rows = parse_envelope(body);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].voucher_no, "SV-3");
    }

    #[test]
    fn skips_blocks_with_no_fields() {
        let body = "<VOUCHER><CANCELLED/></VOUCHER>\
                    <VOUCHER><VCHNO>SV-4</VCHNO><DATE>20250804</DATE>\
                    <PARTY>Acme</PARTY><AMOUNT>5.00</AMOUNT></VOUCHER>";
        let rows = parse_envelope(body);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn partially_filled_blocks_flow_through() {
        let body = "<VOUCHER><VCHNO>SV-5</VCHNO><DATE>20250805</DATE></VOUCHER>";
        let rows = parse_envelope(body);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].party, "");
        assert_eq!(rows[0].amount, "");
    }
}
