//! Database service for dispatch-service.
//!
//! A thin pool wrapper over the embedded store. All SQL lives here apart
//! from the release protocol, whose transaction-scoped statements live next
//! to the coordinator.

use crate::error::{DispatchError, is_unique_violation};
use crate::models::{
    Bill, BillSnapshot, CashierSession, GateLogEntry, PaymentHint, PettyCashEntry, Receipt,
    Release, ReleaseSelfDetail, ReleaseTransporterDetail, TillAdjustment,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::voucher::{BillUpsert, ReceiptUpsert};
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the store and build the connection pool.
    #[instrument(skip(database_url), fields(service = "dispatch-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, DispatchError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Opening dispatch store"
        );

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(options)
            .await?;

        info!("Dispatch store pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check store health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1").execute(&self.pool).await?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), DispatchError> {
        info!("Running store migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DispatchError::Store(sqlx::Error::Migrate(Box::new(e))))?;
        info!("Store migrations completed");
        Ok(())
    }

    // =========================================================================
    // Voucher Upserts
    // =========================================================================

    /// Upsert one cycle's bills in a single transaction. Re-synced vouchers
    /// overwrite every business column and refresh the sync stamp.
    #[instrument(skip(self, bills), fields(count = bills.len()))]
    pub async fn upsert_bills(&self, bills: &[BillUpsert]) -> Result<u64, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_bills"])
            .start_timer();

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for bill in bills {
            sqlx::query(
                r#"
                INSERT INTO bills (voucher_no, bill_date, party, amount_paise, last_sync_utc)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (voucher_no) DO UPDATE SET
                    bill_date = excluded.bill_date,
                    party = excluded.party,
                    amount_paise = excluded.amount_paise,
                    last_sync_utc = excluded.last_sync_utc
                "#,
            )
            .bind(&bill.voucher_no)
            .bind(bill.bill_date)
            .bind(&bill.party)
            .bind(bill.amount_paise)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        timer.observe_duration();
        info!(count = bills.len(), "Bills upserted");

        Ok(bills.len() as u64)
    }

    /// Upsert one cycle's receipts in a single transaction. The mapping link
    /// (`bill_no`) is deliberately left out of the conflict update.
    #[instrument(skip(self, receipts), fields(count = receipts.len()))]
    pub async fn upsert_receipts(&self, receipts: &[ReceiptUpsert]) -> Result<u64, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_receipts"])
            .start_timer();

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for receipt in receipts {
            sqlx::query(
                r#"
                INSERT INTO receipts
                    (receipt_no, receipt_date, party, amount_paise, mode, reference, bill_ref, last_sync_utc)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT (receipt_no) DO UPDATE SET
                    receipt_date = excluded.receipt_date,
                    party = excluded.party,
                    amount_paise = excluded.amount_paise,
                    mode = excluded.mode,
                    reference = excluded.reference,
                    bill_ref = excluded.bill_ref,
                    last_sync_utc = excluded.last_sync_utc
                "#,
            )
            .bind(&receipt.receipt_no)
            .bind(receipt.receipt_date)
            .bind(&receipt.party)
            .bind(receipt.amount_paise)
            .bind(receipt.mode.as_str())
            .bind(&receipt.reference)
            .bind(&receipt.bill_ref)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        timer.observe_duration();
        info!(count = receipts.len(), "Receipts upserted");

        Ok(receipts.len() as u64)
    }

    // =========================================================================
    // Bill Reads
    // =========================================================================

    #[instrument(skip(self), fields(voucher_no = %voucher_no))]
    pub async fn get_bill(&self, voucher_no: &str) -> Result<Option<Bill>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_bill"])
            .start_timer();

        let bill = sqlx::query_as::<_, Bill>(
            r#"
            SELECT voucher_no, bill_date, party, amount_paise, last_sync_utc
            FROM bills
            WHERE voucher_no = ?1
            "#,
        )
        .bind(voucher_no)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(bill)
    }

    #[instrument(skip(self), fields(voucher_no = %voucher_no))]
    pub async fn bill_exists(&self, voucher_no: &str) -> Result<bool, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["bill_exists"])
            .start_timer();

        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM bills WHERE voucher_no = ?1")
            .bind(voucher_no)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();

        Ok(found.is_some())
    }

    /// A bill joined with its mapped receipt total and release columns.
    #[instrument(skip(self), fields(voucher_no = %voucher_no))]
    pub async fn bill_snapshot(
        &self,
        voucher_no: &str,
    ) -> Result<Option<BillSnapshot>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["bill_snapshot"])
            .start_timer();

        let snapshot = sqlx::query_as::<_, BillSnapshot>(
            r#"
            SELECT b.voucher_no, b.bill_date, b.party, b.amount_paise,
                   COALESCE((SELECT SUM(r.amount_paise) FROM receipts r
                             WHERE r.bill_no = b.voucher_no), 0) AS receipt_total_paise,
                   rel.variant AS release_variant,
                   rt.delivered_utc AS delivered_utc
            FROM bills b
            LEFT JOIN releases rel ON rel.bill_no = b.voucher_no
            LEFT JOIN release_transporter rt ON rt.bill_no = b.voucher_no
            WHERE b.voucher_no = ?1
            "#,
        )
        .bind(voucher_no)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(snapshot)
    }

    /// All bills dated `date`, joined as in [`Self::bill_snapshot`]. Feeds
    /// the dashboard counters.
    #[instrument(skip(self), fields(date = %date))]
    pub async fn bills_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<BillSnapshot>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["bills_for_date"])
            .start_timer();

        let snapshot = sqlx::query_as::<_, BillSnapshot>(
            r#"
            SELECT b.voucher_no, b.bill_date, b.party, b.amount_paise,
                   COALESCE((SELECT SUM(r.amount_paise) FROM receipts r
                             WHERE r.bill_no = b.voucher_no), 0) AS receipt_total_paise,
                   rel.variant AS release_variant,
                   rt.delivered_utc AS delivered_utc
            FROM bills b
            LEFT JOIN releases rel ON rel.bill_no = b.voucher_no
            LEFT JOIN release_transporter rt ON rt.bill_no = b.voucher_no
            WHERE b.bill_date = ?1
            ORDER BY b.voucher_no
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(snapshot)
    }

    #[instrument(skip(self), fields(bill_no = %bill_no))]
    pub async fn receipts_for_bill(&self, bill_no: &str) -> Result<Vec<Receipt>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["receipts_for_bill"])
            .start_timer();

        let receipts = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT receipt_no, receipt_date, party, amount_paise, mode, reference,
                   bill_ref, bill_no, last_sync_utc
            FROM receipts
            WHERE bill_no = ?1
            ORDER BY receipt_date, receipt_no
            "#,
        )
        .bind(bill_no)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(receipts)
    }

    #[instrument(skip(self), fields(bill_no = %bill_no))]
    pub async fn receipt_total_for_bill(&self, bill_no: &str) -> Result<i64, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["receipt_total_for_bill"])
            .start_timer();

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount_paise), 0) FROM receipts WHERE bill_no = ?1",
        )
        .bind(bill_no)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(total)
    }

    // =========================================================================
    // Mapping Queries
    // =========================================================================

    /// Unlinked receipts, oldest first. Ties break on receipt number so a
    /// mapping pass is deterministic.
    #[instrument(skip(self))]
    pub async fn unmapped_receipts(&self) -> Result<Vec<Receipt>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["unmapped_receipts"])
            .start_timer();

        let receipts = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT receipt_no, receipt_date, party, amount_paise, mode, reference,
                   bill_ref, bill_no, last_sync_utc
            FROM receipts
            WHERE bill_no IS NULL
            ORDER BY receipt_date, receipt_no
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(receipts)
    }

    /// The oldest bill of `party` whose remaining due covers `amount_paise`
    /// in full. Ties break on voucher number.
    #[instrument(skip(self), fields(party = %party))]
    pub async fn oldest_open_bill_covering(
        &self,
        party: &str,
        amount_paise: i64,
    ) -> Result<Option<Bill>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["oldest_open_bill_covering"])
            .start_timer();

        let bill = sqlx::query_as::<_, Bill>(
            r#"
            SELECT voucher_no, bill_date, party, amount_paise, last_sync_utc
            FROM bills b
            WHERE b.party = ?1
              AND b.amount_paise - COALESCE((SELECT SUM(r.amount_paise) FROM receipts r
                                             WHERE r.bill_no = b.voucher_no), 0) >= ?2
            ORDER BY b.bill_date, b.voucher_no
            LIMIT 1
            "#,
        )
        .bind(party)
        .bind(amount_paise)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(bill)
    }

    /// Set the mapping link on a still-unmapped receipt. The WHERE clause
    /// makes the link a one-way transition even under concurrent passes.
    #[instrument(skip(self), fields(receipt_no = %receipt_no, bill_no = %bill_no))]
    pub async fn link_receipt(
        &self,
        receipt_no: &str,
        bill_no: &str,
    ) -> Result<bool, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["link_receipt"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE receipts SET bill_no = ?2 WHERE receipt_no = ?1 AND bill_no IS NULL",
        )
        .bind(receipt_no)
        .bind(bill_no)
        .execute(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Cashier Sessions
    // =========================================================================

    #[instrument(skip(self), fields(cashier = %cashier))]
    pub async fn active_session_for(
        &self,
        cashier: &str,
    ) -> Result<Option<CashierSession>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["active_session_for"])
            .start_timer();

        let session = sqlx::query_as::<_, CashierSession>(
            r#"
            SELECT session_id, cashier, opened_utc, closed_utc, opening_float_paise,
                   counted_paise, expected_paise, variance_paise, needs_approval,
                   status, approved_by
            FROM cashier_sessions
            WHERE cashier = ?1 AND status = 'active'
            "#,
        )
        .bind(cashier)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(session)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn get_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<CashierSession>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_session"])
            .start_timer();

        let session = sqlx::query_as::<_, CashierSession>(
            r#"
            SELECT session_id, cashier, opened_utc, closed_utc, opening_float_paise,
                   counted_paise, expected_paise, variance_paise, needs_approval,
                   status, approved_by
            FROM cashier_sessions
            WHERE session_id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(session)
    }

    /// Open a session. The partial unique index backs the one-active-per-
    /// cashier invariant; a violation surfaces as the business rejection.
    #[instrument(skip(self), fields(cashier = %cashier))]
    pub async fn insert_session(
        &self,
        cashier: &str,
        opening_float_paise: i64,
    ) -> Result<CashierSession, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_session"])
            .start_timer();

        let session = sqlx::query_as::<_, CashierSession>(
            r#"
            INSERT INTO cashier_sessions (session_id, cashier, opened_utc, opening_float_paise)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING session_id, cashier, opened_utc, closed_utc, opening_float_paise,
                      counted_paise, expected_paise, variance_paise, needs_approval,
                      status, approved_by
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cashier)
        .bind(Utc::now())
        .bind(opening_float_paise)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DispatchError::DuplicateActiveSession(cashier.to_string())
            } else {
                DispatchError::Store(e)
            }
        })?;

        timer.observe_duration();
        info!(session_id = %session.session_id, cashier = %cashier, "Cashier session opened");

        Ok(session)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn insert_petty_cash(
        &self,
        session_id: Uuid,
        amount_paise: i64,
        purpose: &str,
    ) -> Result<PettyCashEntry, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_petty_cash"])
            .start_timer();

        let entry = sqlx::query_as::<_, PettyCashEntry>(
            r#"
            INSERT INTO petty_cash (entry_id, session_id, amount_paise, purpose, created_utc)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING entry_id, session_id, amount_paise, purpose, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(amount_paise)
        .bind(purpose)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(entry)
    }

    #[instrument(skip(self), fields(session_id = %session_id, direction = %direction))]
    pub async fn insert_till_adjustment(
        &self,
        session_id: Uuid,
        direction: &str,
        amount_paise: i64,
        reason: &str,
    ) -> Result<TillAdjustment, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_till_adjustment"])
            .start_timer();

        let adjustment = sqlx::query_as::<_, TillAdjustment>(
            r#"
            INSERT INTO till_adjustments
                (adjustment_id, session_id, direction, amount_paise, reason, created_utc)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING adjustment_id, session_id, direction, amount_paise, reason, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(direction)
        .bind(amount_paise)
        .bind(reason)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(adjustment)
    }

    #[instrument(skip(self), fields(bill_no = %bill_no, session_id = %session_id))]
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_payment_hint(
        &self,
        bill_no: &str,
        session_id: Uuid,
        cashier: &str,
        cash_paise: i64,
        cheque_paise: i64,
        digital_paise: i64,
        reference: Option<&str>,
    ) -> Result<PaymentHint, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_payment_hint"])
            .start_timer();

        let hint = sqlx::query_as::<_, PaymentHint>(
            r#"
            INSERT INTO payment_hints
                (hint_id, bill_no, session_id, cashier, cash_paise, cheque_paise,
                 digital_paise, reference, created_utc)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING hint_id, bill_no, session_id, cashier, cash_paise, cheque_paise,
                      digital_paise, reference, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bill_no)
        .bind(session_id)
        .bind(cashier)
        .bind(cash_paise)
        .bind(cheque_paise)
        .bind(digital_paise)
        .bind(reference)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(hint)
    }

    /// Cash portion of the session's payment hints.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn session_hint_cash_total(&self, session_id: Uuid) -> Result<i64, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["session_hint_cash_total"])
            .start_timer();

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(cash_paise), 0) FROM payment_hints WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(total)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn session_petty_total(&self, session_id: Uuid) -> Result<i64, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["session_petty_total"])
            .start_timer();

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount_paise), 0) FROM petty_cash WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(total)
    }

    /// Net till adjustments: additions count positive, removals negative.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn session_adjustment_net(&self, session_id: Uuid) -> Result<i64, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["session_adjustment_net"])
            .start_timer();

        let net = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(CASE WHEN direction = 'add' THEN amount_paise
                                     ELSE -amount_paise END), 0)
            FROM till_adjustments
            WHERE session_id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(net)
    }

    /// Close an active session with its reconciliation figures. Returns
    /// `None` when the session was not active.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn close_session(
        &self,
        session_id: Uuid,
        counted_paise: i64,
        expected_paise: i64,
        variance_paise: i64,
        needs_approval: bool,
    ) -> Result<Option<CashierSession>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["close_session"])
            .start_timer();

        let session = sqlx::query_as::<_, CashierSession>(
            r#"
            UPDATE cashier_sessions
            SET status = 'closed', closed_utc = ?2, counted_paise = ?3,
                expected_paise = ?4, variance_paise = ?5, needs_approval = ?6
            WHERE session_id = ?1 AND status = 'active'
            RETURNING session_id, cashier, opened_utc, closed_utc, opening_float_paise,
                      counted_paise, expected_paise, variance_paise, needs_approval,
                      status, approved_by
            "#,
        )
        .bind(session_id)
        .bind(Utc::now())
        .bind(counted_paise)
        .bind(expected_paise)
        .bind(variance_paise)
        .bind(needs_approval)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(session)
    }

    /// Approve a closed session. Returns `None` when the session was not in
    /// the closed state.
    #[instrument(skip(self), fields(session_id = %session_id, approved_by = %approved_by))]
    pub async fn approve_session(
        &self,
        session_id: Uuid,
        approved_by: &str,
    ) -> Result<Option<CashierSession>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["approve_session"])
            .start_timer();

        let session = sqlx::query_as::<_, CashierSession>(
            r#"
            UPDATE cashier_sessions
            SET status = 'approved', approved_by = ?2
            WHERE session_id = ?1 AND status = 'closed'
            RETURNING session_id, cashier, opened_utc, closed_utc, opening_float_paise,
                      counted_paise, expected_paise, variance_paise, needs_approval,
                      status, approved_by
            "#,
        )
        .bind(session_id)
        .bind(approved_by)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(session)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn hints_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<PaymentHint>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["hints_for_session"])
            .start_timer();

        let hints = sqlx::query_as::<_, PaymentHint>(
            r#"
            SELECT hint_id, bill_no, session_id, cashier, cash_paise, cheque_paise,
                   digital_paise, reference, created_utc
            FROM payment_hints
            WHERE session_id = ?1
            ORDER BY created_utc, hint_id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(hints)
    }

    #[instrument(skip(self), fields(bill_no = %bill_no))]
    pub async fn hints_for_bill(&self, bill_no: &str) -> Result<Vec<PaymentHint>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["hints_for_bill"])
            .start_timer();

        let hints = sqlx::query_as::<_, PaymentHint>(
            r#"
            SELECT hint_id, bill_no, session_id, cashier, cash_paise, cheque_paise,
                   digital_paise, reference, created_utc
            FROM payment_hints
            WHERE bill_no = ?1
            ORDER BY created_utc, hint_id
            "#,
        )
        .bind(bill_no)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(hints)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn petty_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<PettyCashEntry>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["petty_for_session"])
            .start_timer();

        let entries = sqlx::query_as::<_, PettyCashEntry>(
            r#"
            SELECT entry_id, session_id, amount_paise, purpose, created_utc
            FROM petty_cash
            WHERE session_id = ?1
            ORDER BY created_utc, entry_id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(entries)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn adjustments_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<TillAdjustment>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["adjustments_for_session"])
            .start_timer();

        let adjustments = sqlx::query_as::<_, TillAdjustment>(
            r#"
            SELECT adjustment_id, session_id, direction, amount_paise, reason, created_utc
            FROM till_adjustments
            WHERE session_id = ?1
            ORDER BY created_utc, adjustment_id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(adjustments)
    }

    // =========================================================================
    // Release Reads
    // =========================================================================

    #[instrument(skip(self), fields(bill_no = %bill_no))]
    pub async fn get_release(&self, bill_no: &str) -> Result<Option<Release>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_release"])
            .start_timer();

        let release = sqlx::query_as::<_, Release>(
            r#"
            SELECT bill_no, gatepass_no, variant, released_by, approved_by, approval, released_utc
            FROM releases
            WHERE bill_no = ?1
            "#,
        )
        .bind(bill_no)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(release)
    }

    #[instrument(skip(self), fields(gatepass_no = %gatepass_no))]
    pub async fn release_for_gatepass(
        &self,
        gatepass_no: &str,
    ) -> Result<Option<Release>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["release_for_gatepass"])
            .start_timer();

        let release = sqlx::query_as::<_, Release>(
            r#"
            SELECT bill_no, gatepass_no, variant, released_by, approved_by, approval, released_utc
            FROM releases
            WHERE gatepass_no = ?1
            "#,
        )
        .bind(gatepass_no)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(release)
    }

    #[instrument(skip(self), fields(bill_no = %bill_no))]
    pub async fn get_release_self(
        &self,
        bill_no: &str,
    ) -> Result<Option<ReleaseSelfDetail>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_release_self"])
            .start_timer();

        let detail = sqlx::query_as::<_, ReleaseSelfDetail>(
            "SELECT bill_no, receiver_name, receiver_phone FROM release_self WHERE bill_no = ?1",
        )
        .bind(bill_no)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(detail)
    }

    #[instrument(skip(self), fields(bill_no = %bill_no))]
    pub async fn get_release_transporter(
        &self,
        bill_no: &str,
    ) -> Result<Option<ReleaseTransporterDetail>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_release_transporter"])
            .start_timer();

        let detail = sqlx::query_as::<_, ReleaseTransporterDetail>(
            r#"
            SELECT bill_no, transporter_name, vehicle_no, driver_name, driver_phone,
                   lr_no, delivered_utc, pod_reference
            FROM release_transporter
            WHERE bill_no = ?1
            "#,
        )
        .bind(bill_no)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(detail)
    }

    #[instrument(skip(self), fields(bill_no = %bill_no))]
    pub async fn gate_entries_for_bill(
        &self,
        bill_no: &str,
    ) -> Result<Vec<GateLogEntry>, DispatchError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["gate_entries_for_bill"])
            .start_timer();

        let entries = sqlx::query_as::<_, GateLogEntry>(
            r#"
            SELECT gatepass_no, bill_no, logged_by, vehicle_no, remarks, logged_utc
            FROM gate_log
            WHERE bill_no = ?1
            ORDER BY logged_utc
            "#,
        )
        .bind(bill_no)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(entries)
    }
}
