//! Integration tests for the FIFO auto-mapping engine.

mod common;

use common::{bill, date, receipt, receipt_with_ref, test_db};
use dispatch_service::services::map_unmapped;

#[tokio::test]
async fn receipt_links_to_oldest_open_bill_for_the_party() {
    let (db, _dir) = test_db().await;
    db.upsert_bills(&[
        bill("SV-2", date(2025, 8, 5), "Acme Traders", 50_000),
        bill("SV-1", date(2025, 8, 1), "Acme Traders", 50_000),
    ])
    .await
    .unwrap();
    db.upsert_receipts(&[receipt("RV-1", date(2025, 8, 10), "Acme Traders", 50_000)])
        .await
        .unwrap();

    assert_eq!(map_unmapped(&db).await.unwrap(), 1);

    let receipts = db.receipts_for_bill("SV-1").await.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].receipt_no, "RV-1");
    assert!(db.receipts_for_bill("SV-2").await.unwrap().is_empty());
}

#[tokio::test]
async fn oversized_receipt_is_never_split_across_bills() {
    let (db, _dir) = test_db().await;
    db.upsert_bills(&[
        bill("SV-1", date(2025, 8, 1), "Acme Traders", 50_000),
        bill("SV-2", date(2025, 8, 5), "Acme Traders", 50_000),
    ])
    .await
    .unwrap();
    db.upsert_receipts(&[receipt("RV-1", date(2025, 8, 10), "Acme Traders", 70_000)])
        .await
        .unwrap();

    assert_eq!(map_unmapped(&db).await.unwrap(), 0);
    assert_eq!(db.unmapped_receipts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn explicit_reference_beats_fifo_order() {
    let (db, _dir) = test_db().await;
    db.upsert_bills(&[
        bill("SV-1", date(2025, 8, 1), "Acme Traders", 50_000),
        bill("SV-2", date(2025, 8, 5), "Acme Traders", 50_000),
    ])
    .await
    .unwrap();
    db.upsert_receipts(&[receipt_with_ref(
        "RV-1",
        date(2025, 8, 10),
        "Acme Traders",
        50_000,
        "SV-2",
    )])
    .await
    .unwrap();

    assert_eq!(map_unmapped(&db).await.unwrap(), 1);
    assert_eq!(db.receipts_for_bill("SV-2").await.unwrap().len(), 1);
    assert!(db.receipts_for_bill("SV-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn explicit_reference_overrides_remaining_due_check() {
    let (db, _dir) = test_db().await;
    // The referenced bill cannot absorb the receipt; the reference is
    // trusted anyway and the surplus shows up as overpayment.
    db.upsert_bills(&[bill("SV-1", date(2025, 8, 1), "Acme Traders", 30_000)])
        .await
        .unwrap();
    db.upsert_receipts(&[receipt_with_ref(
        "RV-1",
        date(2025, 8, 10),
        "Acme Traders",
        50_000,
        "SV-1",
    )])
    .await
    .unwrap();

    assert_eq!(map_unmapped(&db).await.unwrap(), 1);
    assert_eq!(db.receipt_total_for_bill("SV-1").await.unwrap(), 50_000);
}

#[tokio::test]
async fn dangling_explicit_reference_stays_unmapped() {
    let (db, _dir) = test_db().await;
    db.upsert_bills(&[bill("SV-1", date(2025, 8, 1), "Acme Traders", 50_000)])
        .await
        .unwrap();
    db.upsert_receipts(&[receipt_with_ref(
        "RV-1",
        date(2025, 8, 10),
        "Acme Traders",
        50_000,
        "SV-99",
    )])
    .await
    .unwrap();

    // No FIFO fallback for an explicit reference the store has not seen.
    assert_eq!(map_unmapped(&db).await.unwrap(), 0);
    assert_eq!(db.unmapped_receipts().await.unwrap().len(), 1);

    // Once the referenced bill arrives, a later pass links it.
    db.upsert_bills(&[bill("SV-99", date(2025, 8, 9), "Acme Traders", 50_000)])
        .await
        .unwrap();
    assert_eq!(map_unmapped(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn earlier_links_consume_remaining_due_within_one_pass() {
    let (db, _dir) = test_db().await;
    db.upsert_bills(&[
        bill("SV-1", date(2025, 8, 1), "Acme Traders", 50_000),
        bill("SV-2", date(2025, 8, 5), "Acme Traders", 50_000),
    ])
    .await
    .unwrap();
    db.upsert_receipts(&[
        receipt("RV-1", date(2025, 8, 10), "Acme Traders", 50_000),
        receipt("RV-2", date(2025, 8, 11), "Acme Traders", 50_000),
    ])
    .await
    .unwrap();

    assert_eq!(map_unmapped(&db).await.unwrap(), 2);
    assert_eq!(db.receipts_for_bill("SV-1").await.unwrap().len(), 1);
    assert_eq!(db.receipts_for_bill("SV-2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn counterparty_match_is_exact() {
    let (db, _dir) = test_db().await;
    db.upsert_bills(&[bill("SV-1", date(2025, 8, 1), "Acme Traders", 50_000)])
        .await
        .unwrap();
    // Trailing space defeats the exact-equality match.
    db.upsert_receipts(&[receipt("RV-1", date(2025, 8, 10), "Acme Traders ", 50_000)])
        .await
        .unwrap();

    assert_eq!(map_unmapped(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn mapped_receipts_are_not_reconsidered() {
    let (db, _dir) = test_db().await;
    db.upsert_bills(&[bill("SV-1", date(2025, 8, 1), "Acme Traders", 50_000)])
        .await
        .unwrap();
    db.upsert_receipts(&[receipt("RV-1", date(2025, 8, 10), "Acme Traders", 20_000)])
        .await
        .unwrap();

    assert_eq!(map_unmapped(&db).await.unwrap(), 1);
    assert_eq!(map_unmapped(&db).await.unwrap(), 0);

    // A re-sync of the same receipt preserves the link.
    db.upsert_receipts(&[receipt("RV-1", date(2025, 8, 10), "Acme Traders", 20_000)])
        .await
        .unwrap();
    let receipts = db.receipts_for_bill("SV-1").await.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(map_unmapped(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn paid_bills_are_not_candidates() {
    let (db, _dir) = test_db().await;
    db.upsert_bills(&[
        bill("SV-1", date(2025, 8, 1), "Acme Traders", 20_000),
        bill("SV-2", date(2025, 8, 5), "Acme Traders", 50_000),
    ])
    .await
    .unwrap();
    db.upsert_receipts(&[receipt("RV-1", date(2025, 8, 8), "Acme Traders", 20_000)])
        .await
        .unwrap();
    assert_eq!(map_unmapped(&db).await.unwrap(), 1);

    // SV-1 is now fully paid; the next receipt skips it even though it is
    // older.
    db.upsert_receipts(&[receipt("RV-2", date(2025, 8, 9), "Acme Traders", 10_000)])
        .await
        .unwrap();
    assert_eq!(map_unmapped(&db).await.unwrap(), 1);
    assert_eq!(db.receipts_for_bill("SV-2").await.unwrap().len(), 1);
}
