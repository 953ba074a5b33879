//! Integration tests for the release coordinator: exactly-once release,
//! gatepass uniqueness, approval gating, delivery confirmation, and the
//! gate register.

mod common;

use common::{seed_bill_with_payment, test_db, TEST_MANAGER_PIN};
use dispatch_service::error::DispatchError;
use dispatch_service::services::release::{
    ReleaseCoordinator, ReleaseRequest, SelfReleaseDetails, TransporterReleaseDetails,
};
use dispatch_service::services::Database;
use secrecy::Secret;

fn coordinator(db: &Database) -> ReleaseCoordinator {
    ReleaseCoordinator::new(db.clone(), Secret::new(TEST_MANAGER_PIN.to_string()))
}

fn self_request(bill_no: &str, gatepass_no: &str) -> ReleaseRequest {
    ReleaseRequest {
        bill_no: bill_no.to_string(),
        gatepass_no: gatepass_no.to_string(),
        released_by: "storekeeper".to_string(),
        approved_by: None,
        manager_pin: None,
        otp_verified: false,
    }
}

fn self_details() -> SelfReleaseDetails {
    SelfReleaseDetails {
        receiver_name: "Ravi".to_string(),
        receiver_phone: "9876543210".to_string(),
    }
}

fn transporter_details() -> TransporterReleaseDetails {
    TransporterReleaseDetails {
        transporter_name: "Highway Logistics".to_string(),
        vehicle_no: "MH12AB1234".to_string(),
        driver_name: "Suresh".to_string(),
        driver_phone: "9123456780".to_string(),
        lr_no: Some("LR-77".to_string()),
    }
}

#[tokio::test]
async fn paid_bill_releases_without_approval() {
    let (db, _dir) = test_db().await;
    seed_bill_with_payment(&db, "SV-1", "Acme Traders", 50_000, 50_000).await;

    let release = coordinator(&db)
        .release_self(self_request("SV-1", "GP-1"), self_details())
        .await
        .unwrap();

    assert_eq!(release.bill_no, "SV-1");
    assert_eq!(release.variant, "self");
    assert_eq!(release.approval, "none");

    let detail = db.get_release_self("SV-1").await.unwrap().unwrap();
    assert_eq!(detail.receiver_name, "Ravi");
}

#[tokio::test]
async fn a_bill_is_released_at_most_once() {
    let (db, _dir) = test_db().await;
    seed_bill_with_payment(&db, "SV-1", "Acme Traders", 50_000, 50_000).await;
    let releases = coordinator(&db);

    releases
        .release_self(self_request("SV-1", "GP-1"), self_details())
        .await
        .unwrap();

    let err = releases
        .release_transporter(self_request("SV-1", "GP-2"), transporter_details())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::AlreadyReleased { .. }));
}

#[tokio::test]
async fn concurrent_release_attempts_exactly_one_wins() {
    let (db, _dir) = test_db().await;
    seed_bill_with_payment(&db, "SV-1", "Acme Traders", 50_000, 50_000).await;

    let a = coordinator(&db);
    let b = coordinator(&db);
    let task_a = tokio::spawn(async move {
        a.release_self(self_request("SV-1", "GP-A"), self_details())
            .await
    });
    let task_b = tokio::spawn(async move {
        b.release_self(self_request("SV-1", "GP-B"), self_details())
            .await
    });

    let result_a = task_a.await.unwrap();
    let result_b = task_b.await.unwrap();

    let winners = [&result_a, &result_b]
        .iter()
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(winners, 1, "exactly one attempt must win");

    let loser = if result_a.is_ok() { result_b } else { result_a };
    assert!(matches!(
        loser.unwrap_err(),
        DispatchError::AlreadyReleased { .. }
    ));

    assert!(db.get_release("SV-1").await.unwrap().is_some());
}

#[tokio::test]
async fn gatepass_is_unique_across_variants_and_bills() {
    let (db, _dir) = test_db().await;
    seed_bill_with_payment(&db, "SV-1", "Acme Traders", 50_000, 50_000).await;
    seed_bill_with_payment(&db, "SV-2", "Bharat Mills", 30_000, 30_000).await;
    let releases = coordinator(&db);

    releases
        .release_self(self_request("SV-1", "GP-1"), self_details())
        .await
        .unwrap();

    // Same gatepass, different bill, different variant.
    let err = releases
        .release_transporter(self_request("SV-2", "GP-1"), transporter_details())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::GatepassInUse { gatepass_no } if gatepass_no == "GP-1"
    ));

    // A fresh gatepass goes through.
    releases
        .release_transporter(self_request("SV-2", "GP-2"), transporter_details())
        .await
        .unwrap();
}

#[tokio::test]
async fn part_paid_bill_requires_approval() {
    let (db, _dir) = test_db().await;
    seed_bill_with_payment(&db, "SV-1", "Acme Traders", 50_000, 20_000).await;
    let releases = coordinator(&db);

    let err = releases
        .release_self(self_request("SV-1", "GP-1"), self_details())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::ApprovalRequired {
            remaining_due_paise: 30_000,
            ..
        }
    ));
    assert!(db.get_release("SV-1").await.unwrap().is_none());
}

#[tokio::test]
async fn wrong_manager_pin_is_no_approval() {
    let (db, _dir) = test_db().await;
    seed_bill_with_payment(&db, "SV-1", "Acme Traders", 50_000, 0).await;
    let releases = coordinator(&db);

    let mut request = self_request("SV-1", "GP-1");
    request.manager_pin = Some("0000".to_string());
    let err = releases
        .release_self(request, self_details())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::ApprovalRequired { .. }));
}

#[tokio::test]
async fn manager_pin_approves_part_paid_release() {
    let (db, _dir) = test_db().await;
    seed_bill_with_payment(&db, "SV-1", "Acme Traders", 50_000, 20_000).await;
    let releases = coordinator(&db);

    let mut request = self_request("SV-1", "GP-1");
    request.manager_pin = Some(TEST_MANAGER_PIN.to_string());
    request.approved_by = Some("manager-anita".to_string());
    let release = releases.release_self(request, self_details()).await.unwrap();

    assert_eq!(release.approval, "pin");
    assert_eq!(release.approved_by.as_deref(), Some("manager-anita"));
}

#[tokio::test]
async fn verified_otp_approves_part_paid_release() {
    let (db, _dir) = test_db().await;
    seed_bill_with_payment(&db, "SV-1", "Acme Traders", 50_000, 20_000).await;
    let releases = coordinator(&db);

    let mut request = self_request("SV-1", "GP-1");
    request.otp_verified = true;
    let release = releases.release_self(request, self_details()).await.unwrap();

    assert_eq!(release.approval, "otp");
    assert_eq!(release.approved_by, None);
}

#[tokio::test]
async fn unknown_bill_is_rejected() {
    let (db, _dir) = test_db().await;
    let err = coordinator(&db)
        .release_self(self_request("SV-404", "GP-1"), self_details())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::BillNotFound(_)));
}

#[tokio::test]
async fn delivery_confirmation_is_exactly_once() {
    let (db, _dir) = test_db().await;
    seed_bill_with_payment(&db, "SV-1", "Acme Traders", 50_000, 50_000).await;
    let releases = coordinator(&db);

    releases
        .release_transporter(self_request("SV-1", "GP-1"), transporter_details())
        .await
        .unwrap();

    releases.confirm_delivery("SV-1", "POD-100").await.unwrap();
    let detail = db.get_release_transporter("SV-1").await.unwrap().unwrap();
    assert!(detail.delivered_utc.is_some());
    assert_eq!(detail.pod_reference.as_deref(), Some("POD-100"));

    // A second confirmation can never overwrite the first POD.
    let err = releases
        .confirm_delivery("SV-1", "POD-200")
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::DeliveryAlreadyConfirmed(_)));
    let detail = db.get_release_transporter("SV-1").await.unwrap().unwrap();
    assert_eq!(detail.pod_reference.as_deref(), Some("POD-100"));
}

#[tokio::test]
async fn delivery_confirmation_rejects_self_releases() {
    let (db, _dir) = test_db().await;
    seed_bill_with_payment(&db, "SV-1", "Acme Traders", 50_000, 50_000).await;
    let releases = coordinator(&db);

    releases
        .release_self(self_request("SV-1", "GP-1"), self_details())
        .await
        .unwrap();

    let err = releases
        .confirm_delivery("SV-1", "POD-100")
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotTransporterRelease(_)));
}

#[tokio::test]
async fn gate_log_requires_an_issued_gatepass() {
    let (db, _dir) = test_db().await;
    let releases = coordinator(&db);

    let err = releases
        .log_gate_exit("GP-404", "guard-1", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::GatepassUnknown(_)));
}

#[tokio::test]
async fn gate_log_is_one_entry_per_gatepass() {
    let (db, _dir) = test_db().await;
    seed_bill_with_payment(&db, "SV-1", "Acme Traders", 50_000, 50_000).await;
    let releases = coordinator(&db);

    releases
        .release_self(self_request("SV-1", "GP-1"), self_details())
        .await
        .unwrap();

    releases
        .log_gate_exit("GP-1", "guard-1", Some("MH12AB1234"), None)
        .await
        .unwrap();

    let err = releases
        .log_gate_exit("GP-1", "guard-2", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::GateAlreadyLogged(_)));

    let entries = db.gate_entries_for_bill("SV-1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].logged_by, "guard-1");
}
