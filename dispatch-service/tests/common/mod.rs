//! Common test utilities for dispatch-service integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use dispatch_service::config::{
    DatabaseConfig, DispatchConfig, ReleaseConfig, SessionConfig, SyncConfig, UpstreamConfig,
};
use dispatch_service::services::Database;
use dispatch_service::services::voucher::{BillUpsert, ReceiptUpsert};
use dispatch_service::startup::Application;
use secrecy::Secret;
use service_core::config::Config as CommonConfig;
use std::sync::Once;
use tempfile::TempDir;

pub const TEST_MANAGER_PIN: &str = "4321";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,dispatch_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A file-backed store in a temp directory, so multiple pool connections
/// see the same data.
pub async fn test_db() -> (Database, TempDir) {
    init_tracing();
    let dir = TempDir::new().expect("Failed to create temp dir");
    let url = format!("sqlite://{}/dispatch.db", dir.path().display());
    let db = Database::new(&url, 4, 1)
        .await
        .expect("Failed to open test store");
    db.run_migrations().await.expect("Failed to run migrations");
    (db, dir)
}

/// Test configuration pointing at the given store and upstream endpoints.
pub fn test_config(
    database_url: &str,
    tabular_endpoints: Vec<String>,
    document_endpoint: String,
) -> DispatchConfig {
    DispatchConfig {
        common: CommonConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        service_name: "dispatch-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: database_url.to_string(),
            max_connections: 4,
            min_connections: 1,
        },
        upstream: UpstreamConfig {
            tabular_endpoints,
            document_endpoint,
            probe_timeout_secs: 2,
            fetch_timeout_secs: 5,
        },
        sync: SyncConfig {
            // Long enough that the scheduler never interferes with a test.
            interval_secs: 3600,
            window_days: 30,
        },
        release: ReleaseConfig {
            manager_pin: Secret::new(TEST_MANAGER_PIN.to_string()),
        },
        session: SessionConfig {
            variance_threshold_paise: 10_000,
        },
    }
}

/// Test application wrapper.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: Database,
    pub client: reqwest::Client,
    _db_dir: TempDir,
}

/// Spawn a test application. Upstream endpoints default to dead ports so
/// the probe pins `none`; pass live (wiremock) endpoints to exercise sync.
pub async fn spawn_app_with_upstream(
    tabular_endpoints: Vec<String>,
    document_endpoint: String,
) -> TestApp {
    init_tracing();

    let dir = TempDir::new().expect("Failed to create temp dir");
    let url = format!("sqlite://{}/dispatch.db", dir.path().display());
    let config = test_config(&url, tabular_endpoints, document_endpoint);

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = app.port();
    let db = app.db().clone();

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        db,
        client: reqwest::Client::new(),
        _db_dir: dir,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_upstream(
        vec!["http://127.0.0.1:1".to_string()],
        "http://127.0.0.1:1".to_string(),
    )
    .await
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn bill(voucher_no: &str, bill_date: NaiveDate, party: &str, amount_paise: i64) -> BillUpsert {
    BillUpsert {
        voucher_no: voucher_no.to_string(),
        bill_date,
        party: party.to_string(),
        amount_paise,
    }
}

pub fn receipt(
    receipt_no: &str,
    receipt_date: NaiveDate,
    party: &str,
    amount_paise: i64,
) -> ReceiptUpsert {
    ReceiptUpsert {
        receipt_no: receipt_no.to_string(),
        receipt_date,
        party: party.to_string(),
        amount_paise,
        mode: dispatch_service::models::PaymentMode::Cash,
        reference: None,
        bill_ref: None,
    }
}

/// A receipt carrying an explicit `BILL:` reference.
pub fn receipt_with_ref(
    receipt_no: &str,
    receipt_date: NaiveDate,
    party: &str,
    amount_paise: i64,
    bill_ref: &str,
) -> ReceiptUpsert {
    let mut r = receipt(receipt_no, receipt_date, party, amount_paise);
    r.reference = Some(format!("against BILL:{bill_ref}"));
    r.bill_ref = Some(bill_ref.to_string());
    r
}

/// Seed a bill and a mapped receipt paying `paid_paise` of it.
pub async fn seed_bill_with_payment(
    db: &Database,
    voucher_no: &str,
    party: &str,
    amount_paise: i64,
    paid_paise: i64,
) {
    db.upsert_bills(&[bill(voucher_no, date(2025, 8, 1), party, amount_paise)])
        .await
        .expect("Failed to seed bill");
    if paid_paise > 0 {
        let receipt_no = format!("RV-{voucher_no}");
        db.upsert_receipts(&[receipt(&receipt_no, date(2025, 8, 2), party, paid_paise)])
            .await
            .expect("Failed to seed receipt");
        assert!(
            db.link_receipt(&receipt_no, voucher_no)
                .await
                .expect("Failed to link receipt"),
            "seed receipt should link"
        );
    }
}
