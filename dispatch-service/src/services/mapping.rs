//! Auto-mapping: link receipts to the bills they pay off.
//!
//! Unmapped receipts are scanned oldest-first. An explicit `BILL:` reference
//! in the narration is authoritative when the referenced bill exists;
//! otherwise the receipt goes to the oldest same-party bill whose remaining
//! due covers the receipt in full. A receipt no candidate can absorb stays
//! unmapped -- the mapper never splits one receipt across bills.

use crate::error::DispatchError;
use crate::services::database::Database;
use crate::services::metrics::record_receipt_mapped;
use tracing::{debug, info, instrument};

/// Run one mapping pass over all unmapped receipts. Returns the number of
/// receipts linked.
///
/// Each link is committed on its own, so later receipts in the same pass see
/// the remaining-due impact of earlier links.
#[instrument(skip(db))]
pub async fn map_unmapped(db: &Database) -> Result<u64, DispatchError> {
    let receipts = db.unmapped_receipts().await?;
    let mut mapped = 0;

    for receipt in receipts {
        // Explicit reference wins over FIFO, regardless of remaining due.
        // A reference to a bill the store has not seen yet is left alone
        // and retried on the next pass.
        if let Some(bill_ref) = &receipt.bill_ref {
            if db.bill_exists(bill_ref).await? {
                if db.link_receipt(&receipt.receipt_no, bill_ref).await? {
                    info!(
                        receipt_no = %receipt.receipt_no,
                        bill_no = %bill_ref,
                        "Receipt mapped by explicit reference"
                    );
                    record_receipt_mapped("explicit");
                    mapped += 1;
                }
            } else {
                debug!(
                    receipt_no = %receipt.receipt_no,
                    bill_ref = %bill_ref,
                    "Explicit bill reference not in store yet, leaving unmapped"
                );
            }
            continue;
        }

        let candidate = db
            .oldest_open_bill_covering(&receipt.party, receipt.amount_paise)
            .await?;
        match candidate {
            Some(bill) => {
                if db.link_receipt(&receipt.receipt_no, &bill.voucher_no).await? {
                    info!(
                        receipt_no = %receipt.receipt_no,
                        bill_no = %bill.voucher_no,
                        party = %receipt.party,
                        "Receipt mapped FIFO"
                    );
                    record_receipt_mapped("fifo");
                    mapped += 1;
                }
            }
            None => {
                debug!(
                    receipt_no = %receipt.receipt_no,
                    party = %receipt.party,
                    amount_paise = receipt.amount_paise,
                    "No open bill can absorb this receipt in full"
                );
            }
        }
    }

    Ok(mapped)
}
