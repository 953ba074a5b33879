//! Smoke tests for the HTTP surface against a spawned application.

mod common;

use common::{seed_bill_with_payment, spawn_app, TEST_MANAGER_PIN};
use serde_json::{json, Value};

#[tokio::test]
async fn health_reports_service_and_source_method() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["service"], "dispatch-service");
    assert_eq!(body["source_method"], "none");
}

#[tokio::test]
async fn sync_run_without_upstream_is_bad_gateway() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/sync/run", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    let status: Value = app
        .client
        .get(format!("{}/sync/status", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["last_outcome"], "failed");
    assert_eq!(status["in_progress"], false);
}

#[tokio::test]
async fn release_flow_over_http() {
    let app = spawn_app().await;
    seed_bill_with_payment(&app.db, "SV-1", "Acme Traders", 50_000, 50_000).await;
    seed_bill_with_payment(&app.db, "SV-2", "Bharat Mills", 30_000, 30_000).await;

    let release_body = json!({
        "bill_no": "SV-1",
        "gatepass_no": "GP-1",
        "receiver_name": "Ravi",
        "receiver_phone": "9876543210",
        "released_by": "storekeeper"
    });

    let response = app
        .client
        .post(format!("{}/releases/self", app.address))
        .json(&release_body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["variant"], "self");
    assert_eq!(body["self_pickup"]["receiver_name"], "Ravi");

    // Releasing the same bill again conflicts.
    let response = app
        .client
        .post(format!("{}/releases/self", app.address))
        .json(&release_body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("ALREADY_RELEASED"));

    // Reusing the gatepass on another bill conflicts too.
    let response = app
        .client
        .post(format!("{}/releases/self", app.address))
        .json(&json!({
            "bill_no": "SV-2",
            "gatepass_no": "GP-1",
            "receiver_name": "Meena",
            "receiver_phone": "9876543211",
            "released_by": "storekeeper"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("GATEPASS_IN_USE"));

    // Gate register: first entry passes, second conflicts.
    let gate_body = json!({ "gatepass_no": "GP-1", "logged_by": "guard-1" });
    let response = app
        .client
        .post(format!("{}/gate-log", app.address))
        .json(&gate_body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let response = app
        .client
        .post(format!("{}/gate-log", app.address))
        .json(&gate_body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // The bill detail reflects everything.
    let bill: Value = app
        .client
        .get(format!("{}/bills/SV-1", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(bill["status"], "PAID");
    assert_eq!(bill["release_state"], "RELEASED_SELF");
    assert_eq!(bill["remaining_due"], "0.00");
    assert_eq!(bill["gate_log"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn part_paid_release_needs_approval_over_http() {
    let app = spawn_app().await;
    seed_bill_with_payment(&app.db, "SV-1", "Acme Traders", 50_000, 20_000).await;

    let mut body = json!({
        "bill_no": "SV-1",
        "gatepass_no": "GP-1",
        "receiver_name": "Ravi",
        "receiver_phone": "9876543210",
        "released_by": "storekeeper"
    });

    let response = app
        .client
        .post(format!("{}/releases/self", app.address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let err: Value = response.json().await.unwrap();
    assert!(err["error"].as_str().unwrap().contains("APPROVAL_REQUIRED"));

    body["manager_pin"] = json!(TEST_MANAGER_PIN);
    body["approved_by"] = json!("manager-anita");
    let response = app
        .client
        .post(format!("{}/releases/self", app.address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let release: Value = response.json().await.unwrap();
    assert_eq!(release["approval"], "pin");
}

#[tokio::test]
async fn transporter_delivery_flow_over_http() {
    let app = spawn_app().await;
    seed_bill_with_payment(&app.db, "SV-1", "Acme Traders", 50_000, 50_000).await;

    let response = app
        .client
        .post(format!("{}/releases/transporter", app.address))
        .json(&json!({
            "bill_no": "SV-1",
            "gatepass_no": "GP-1",
            "transporter_name": "Highway Logistics",
            "vehicle_no": "MH12AB1234",
            "driver_name": "Suresh",
            "driver_phone": "9123456780",
            "lr_no": "LR-77",
            "released_by": "storekeeper"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let bill: Value = app
        .client
        .get(format!("{}/bills/SV-1", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(bill["release_state"], "IN_TRANSIT");

    let response = app
        .client
        .post(format!("{}/releases/SV-1/delivery", app.address))
        .json(&json!({ "pod_reference": "POD-9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let bill: Value = app
        .client
        .get(format!("{}/bills/SV-1", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(bill["release_state"], "DELIVERED");

    let response = app
        .client
        .post(format!("{}/releases/SV-1/delivery", app.address))
        .json(&json!({ "pod_reference": "POD-10" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn session_lifecycle_over_http() {
    let app = spawn_app().await;
    seed_bill_with_payment(&app.db, "SV-1", "Acme Traders", 500_000, 0).await;

    let response = app
        .client
        .post(format!("{}/sessions", app.address))
        .json(&json!({ "cashier": "asha", "opening_float": "1000.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let session: Value = response.json().await.unwrap();
    let session_id = session["session_id"].as_str().unwrap().to_string();
    assert_eq!(session["status"], "active");
    assert_eq!(session["opening_float"], "1000.00");

    let response = app
        .client
        .post(format!("{}/payment-hints", app.address))
        .json(&json!({
            "session_id": session_id,
            "bill_no": "SV-1",
            "cash": "1500.00"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let detail: Value = app
        .client
        .get(format!("{}/sessions/{}", app.address, session_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["live_expected_cash"], "2500.00");

    let response = app
        .client
        .post(format!("{}/sessions/{}/close", app.address, session_id))
        .json(&json!({ "counted_cash": "2000.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let closed: Value = response.json().await.unwrap();
    assert_eq!(closed["status"], "closed");
    assert_eq!(closed["expected_cash"], "2500.00");
    assert_eq!(closed["variance"], "-500.00");
    assert_eq!(closed["needs_approval"], true);

    let response = app
        .client
        .post(format!("{}/sessions/{}/approve", app.address, session_id))
        .json(&json!({ "approved_by": "supervisor-raj" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let approved: Value = response.json().await.unwrap();
    assert_eq!(approved["status"], "approved");
}

#[tokio::test]
async fn dashboard_counts_by_status_and_release_state() {
    let app = spawn_app().await;
    seed_bill_with_payment(&app.db, "SV-1", "Acme Traders", 50_000, 50_000).await;
    seed_bill_with_payment(&app.db, "SV-2", "Bharat Mills", 50_000, 20_000).await;
    seed_bill_with_payment(&app.db, "SV-3", "Sharma & Sons", 50_000, 0).await;

    app.client
        .post(format!("{}/releases/self", app.address))
        .json(&json!({
            "bill_no": "SV-1",
            "gatepass_no": "GP-1",
            "receiver_name": "Ravi",
            "receiver_phone": "9876543210",
            "released_by": "storekeeper"
        }))
        .send()
        .await
        .unwrap();

    let dashboard: Value = app
        .client
        .get(format!("{}/dashboard?date=2025-08-01", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(dashboard["bills_total"], 3);
    assert_eq!(dashboard["by_status"]["paid"], 1);
    assert_eq!(dashboard["by_status"]["part_paid"], 1);
    assert_eq!(dashboard["by_status"]["due"], 1);
    assert_eq!(dashboard["by_release_state"]["released_self"], 1);
    assert_eq!(dashboard["by_release_state"]["ready"], 2);
}

#[tokio::test]
async fn invalid_payloads_are_unprocessable() {
    let app = spawn_app().await;

    // Missing receiver details.
    let response = app
        .client
        .post(format!("{}/releases/self", app.address))
        .json(&json!({
            "bill_no": "SV-1",
            "gatepass_no": "",
            "receiver_name": "",
            "receiver_phone": "12",
            "released_by": ""
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);

    // Unknown bill after validation passes.
    let response = app
        .client
        .get(format!("{}/bills/SV-404", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Garbled money string.
    let response = app
        .client
        .post(format!("{}/sessions", app.address))
        .json(&json!({ "cashier": "asha", "opening_float": "one thousand" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
