//! Release coordinator: exactly-once gate release of goods against bills.
//!
//! Approval (manager PIN or customer OTP) is resolved before any lock is
//! taken, so user interaction never happens under the lock. The release
//! itself is one short transaction whose first statement is a write into
//! the `release_locks` lease table; the store's writer serialization then
//! orders competing attempts, and each attempt re-checks the bill and
//! gatepass inside the transaction before inserting. The registry's
//! PRIMARY KEY and UNIQUE constraints are the backstop for anything that
//! slips past the re-checks.

use crate::error::{DispatchError, is_unique_violation};
use crate::models::{ApprovalKind, Release, ReleaseVariant};
use crate::services::database::Database;
use crate::services::metrics::record_release;
use chrono::Utc;
use secrecy::{ExposeSecret, Secret};
use sqlx::{Sqlite, Transaction};
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

/// Fields shared by both release variants.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub bill_no: String,
    pub gatepass_no: String,
    pub released_by: String,
    /// Manager who stood in for a part-paid release, when PIN-approved.
    pub approved_by: Option<String>,
    pub manager_pin: Option<String>,
    pub otp_verified: bool,
}

#[derive(Debug, Clone)]
pub struct SelfReleaseDetails {
    pub receiver_name: String,
    pub receiver_phone: String,
}

#[derive(Debug, Clone)]
pub struct TransporterReleaseDetails {
    pub transporter_name: String,
    pub vehicle_no: String,
    pub driver_name: String,
    pub driver_phone: String,
    pub lr_no: Option<String>,
}

enum VariantDetails {
    SelfPickup(SelfReleaseDetails),
    Transporter(TransporterReleaseDetails),
}

impl VariantDetails {
    fn variant(&self) -> ReleaseVariant {
        match self {
            Self::SelfPickup(_) => ReleaseVariant::SelfPickup,
            Self::Transporter(_) => ReleaseVariant::Transporter,
        }
    }
}

#[derive(Clone)]
pub struct ReleaseCoordinator {
    db: Database,
    manager_pin: Secret<String>,
}

impl ReleaseCoordinator {
    pub fn new(db: Database, manager_pin: Secret<String>) -> Self {
        Self { db, manager_pin }
    }

    /// Release a bill to the customer at the counter.
    #[instrument(skip(self, request, details), fields(bill_no = %request.bill_no))]
    pub async fn release_self(
        &self,
        request: ReleaseRequest,
        details: SelfReleaseDetails,
    ) -> Result<Release, DispatchError> {
        self.release(request, VariantDetails::SelfPickup(details))
            .await
    }

    /// Release a bill to a transporter for delivery.
    #[instrument(skip(self, request, details), fields(bill_no = %request.bill_no))]
    pub async fn release_transporter(
        &self,
        request: ReleaseRequest,
        details: TransporterReleaseDetails,
    ) -> Result<Release, DispatchError> {
        self.release(request, VariantDetails::Transporter(details))
            .await
    }

    async fn release(
        &self,
        request: ReleaseRequest,
        details: VariantDetails,
    ) -> Result<Release, DispatchError> {
        let variant = details.variant();
        let approval = self.resolve_approval(&request);

        let result = self.release_locked(&request, &details, approval).await;
        match &result {
            Ok(_) => record_release(variant.as_str(), "released"),
            Err(DispatchError::AlreadyReleased { .. }) => {
                record_release(variant.as_str(), "already_released");
            }
            Err(DispatchError::GatepassInUse { .. }) => {
                record_release(variant.as_str(), "gatepass_in_use");
            }
            Err(DispatchError::ApprovalRequired { .. }) => {
                record_release(variant.as_str(), "approval_required");
            }
            Err(_) => record_release(variant.as_str(), "error"),
        }
        result
    }

    /// The lock-then-recheck-then-insert transaction. Rolls back on drop on
    /// every error path.
    async fn release_locked(
        &self,
        request: &ReleaseRequest,
        details: &VariantDetails,
        approval: ApprovalKind,
    ) -> Result<Release, DispatchError> {
        let mut tx = self.db.pool().begin().await?;

        // First statement is a write: take the per-bill lease so this
        // transaction holds the writer slot and sees a current snapshot for
        // the re-checks below.
        sqlx::query(
            r#"
            INSERT INTO release_locks (bill_no, locked_utc) VALUES (?1, ?2)
            ON CONFLICT (bill_no) DO UPDATE SET locked_utc = excluded.locked_utc
            "#,
        )
        .bind(&request.bill_no)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        // Re-check under the lock: the unlocked pre-checks the caller may
        // have done can race.
        let existing = sqlx::query_scalar::<_, i64>("SELECT 1 FROM releases WHERE bill_no = ?1")
            .bind(&request.bill_no)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(DispatchError::AlreadyReleased {
                bill_no: request.bill_no.clone(),
            });
        }

        let gatepass_used =
            sqlx::query_scalar::<_, i64>("SELECT 1 FROM releases WHERE gatepass_no = ?1")
                .bind(&request.gatepass_no)
                .fetch_optional(&mut *tx)
                .await?;
        if gatepass_used.is_some() {
            return Err(DispatchError::GatepassInUse {
                gatepass_no: request.gatepass_no.clone(),
            });
        }

        let remaining_due = remaining_due_in_tx(&mut tx, &request.bill_no)
            .await?
            .ok_or_else(|| DispatchError::BillNotFound(request.bill_no.clone()))?;

        if remaining_due > 0 && approval == ApprovalKind::None {
            warn!(
                bill_no = %request.bill_no,
                remaining_due_paise = remaining_due,
                "Release of a part-paid bill attempted without approval"
            );
            return Err(DispatchError::ApprovalRequired {
                bill_no: request.bill_no.clone(),
                remaining_due_paise: remaining_due,
            });
        }

        let now = Utc::now();
        let approved_by = match approval {
            ApprovalKind::Pin => request.approved_by.as_deref(),
            _ => None,
        };
        let variant = details.variant();

        let release = sqlx::query_as::<_, Release>(
            r#"
            INSERT INTO releases
                (bill_no, gatepass_no, variant, released_by, approved_by, approval, released_utc)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING bill_no, gatepass_no, variant, released_by, approved_by, approval,
                      released_utc
            "#,
        )
        .bind(&request.bill_no)
        .bind(&request.gatepass_no)
        .bind(variant.as_str())
        .bind(&request.released_by)
        .bind(approved_by)
        .bind(approval.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| self.map_registry_violation(e, request))?;

        match details {
            VariantDetails::SelfPickup(d) => {
                sqlx::query(
                    "INSERT INTO release_self (bill_no, receiver_name, receiver_phone) \
                     VALUES (?1, ?2, ?3)",
                )
                .bind(&request.bill_no)
                .bind(&d.receiver_name)
                .bind(&d.receiver_phone)
                .execute(&mut *tx)
                .await?;
            }
            VariantDetails::Transporter(d) => {
                sqlx::query(
                    r#"
                    INSERT INTO release_transporter
                        (bill_no, transporter_name, vehicle_no, driver_name, driver_phone, lr_no)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )
                .bind(&request.bill_no)
                .bind(&d.transporter_name)
                .bind(&d.vehicle_no)
                .bind(&d.driver_name)
                .bind(&d.driver_phone)
                .bind(&d.lr_no)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query("DELETE FROM release_locks WHERE bill_no = ?1")
            .bind(&request.bill_no)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            bill_no = %release.bill_no,
            gatepass_no = %release.gatepass_no,
            variant = %release.variant,
            approval = %release.approval,
            "Bill released"
        );

        Ok(release)
    }

    /// Record delivery of a transporter release. Exactly once per bill; a
    /// second confirmation can never overwrite the first POD reference.
    #[instrument(skip(self, pod_reference), fields(bill_no = %bill_no))]
    pub async fn confirm_delivery(
        &self,
        bill_no: &str,
        pod_reference: &str,
    ) -> Result<(), DispatchError> {
        let release = self
            .db
            .get_release(bill_no)
            .await?
            .ok_or_else(|| DispatchError::ReleaseNotFound(bill_no.to_string()))?;
        if ReleaseVariant::from_str(&release.variant) != ReleaseVariant::Transporter {
            return Err(DispatchError::NotTransporterRelease(bill_no.to_string()));
        }

        let result = sqlx::query(
            r#"
            UPDATE release_transporter
            SET delivered_utc = ?2, pod_reference = ?3
            WHERE bill_no = ?1 AND delivered_utc IS NULL
            "#,
        )
        .bind(bill_no)
        .bind(Utc::now())
        .bind(pod_reference)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DispatchError::DeliveryAlreadyConfirmed(bill_no.to_string()));
        }

        info!(bill_no = %bill_no, "Delivery confirmed");
        Ok(())
    }

    /// Append a gate register entry for an issued gatepass. One entry per
    /// gatepass, enforced by the gate_log primary key.
    #[instrument(skip(self, remarks), fields(gatepass_no = %gatepass_no))]
    pub async fn log_gate_exit(
        &self,
        gatepass_no: &str,
        logged_by: &str,
        vehicle_no: Option<&str>,
        remarks: Option<&str>,
    ) -> Result<(), DispatchError> {
        let release = self
            .db
            .release_for_gatepass(gatepass_no)
            .await?
            .ok_or_else(|| DispatchError::GatepassUnknown(gatepass_no.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO gate_log (gatepass_no, bill_no, logged_by, vehicle_no, remarks, logged_utc)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(gatepass_no)
        .bind(&release.bill_no)
        .bind(logged_by)
        .bind(vehicle_no)
        .bind(remarks)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DispatchError::GateAlreadyLogged(gatepass_no.to_string())
            } else {
                DispatchError::Store(e)
            }
        })?;

        info!(gatepass_no = %gatepass_no, bill_no = %release.bill_no, "Gate exit logged");
        Ok(())
    }

    /// Resolve the approval the caller supplied, before any lock is taken.
    /// PIN comparison is constant-time.
    fn resolve_approval(&self, request: &ReleaseRequest) -> ApprovalKind {
        if let Some(pin) = &request.manager_pin {
            let expected = self.manager_pin.expose_secret().as_bytes();
            if pin.as_bytes().ct_eq(expected).into() {
                return ApprovalKind::Pin;
            }
        }
        if request.otp_verified {
            return ApprovalKind::Otp;
        }
        ApprovalKind::None
    }

    /// Map a registry constraint hit onto the business rejection it stands
    /// in for. Both columns are re-checked earlier in the transaction, so
    /// this only fires on a race the lease did not serialize.
    fn map_registry_violation(
        &self,
        err: sqlx::Error,
        request: &ReleaseRequest,
    ) -> DispatchError {
        if is_unique_violation(&err) {
            let gatepass_hit = err
                .as_database_error()
                .map(|db| db.message().contains("gatepass_no"))
                .unwrap_or(false);
            if gatepass_hit {
                return DispatchError::GatepassInUse {
                    gatepass_no: request.gatepass_no.clone(),
                };
            }
            return DispatchError::AlreadyReleased {
                bill_no: request.bill_no.clone(),
            };
        }
        DispatchError::Store(err)
    }
}

/// Remaining due of a bill, read inside the release transaction so the
/// figure reflects the locked snapshot. `None` when the bill is unknown.
async fn remaining_due_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    bill_no: &str,
) -> Result<Option<i64>, DispatchError> {
    let row = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT b.amount_paise - COALESCE((SELECT SUM(r.amount_paise) FROM receipts r
                                          WHERE r.bill_no = b.voucher_no), 0)
        FROM bills b
        WHERE b.voucher_no = ?1
        "#,
    )
    .bind(bill_no)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(|due| due.max(0)))
}
