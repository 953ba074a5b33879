//! Cashier session workflow: open, record entries, close with
//! reconciliation, approve.

use crate::error::DispatchError;
use crate::models::{
    AdjustmentDirection, CashierSession, PaymentHint, PettyCashEntry, SessionStatus,
    TillAdjustment,
};
use crate::services::database::Database;
use crate::services::status::{breaches_threshold, expected_cash_paise, variance_paise};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A session with its entries and the expected-cash figure as of now.
/// Served live for active sessions; for closed ones the persisted figures
/// are authoritative.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session: CashierSession,
    pub hints: Vec<PaymentHint>,
    pub petty_cash: Vec<PettyCashEntry>,
    pub adjustments: Vec<TillAdjustment>,
    pub live_expected_paise: i64,
}

#[derive(Clone)]
pub struct Sessions {
    db: Database,
    variance_threshold_paise: i64,
}

impl Sessions {
    pub fn new(db: Database, variance_threshold_paise: i64) -> Self {
        Self {
            db,
            variance_threshold_paise,
        }
    }

    /// Open a session for a cashier. One active session per cashier.
    #[instrument(skip(self), fields(cashier = %cashier))]
    pub async fn open(
        &self,
        cashier: &str,
        opening_float_paise: i64,
    ) -> Result<CashierSession, DispatchError> {
        if opening_float_paise < 0 {
            return Err(DispatchError::InvalidAmount(
                "opening float cannot be negative".to_string(),
            ));
        }
        self.db.insert_session(cashier, opening_float_paise).await
    }

    /// Record how a bill was paid at the counter. Requires the bill to exist
    /// and the session to be active; the split must carry some money.
    #[instrument(skip(self), fields(bill_no = %bill_no, session_id = %session_id))]
    #[allow(clippy::too_many_arguments)]
    pub async fn record_payment_hint(
        &self,
        session_id: Uuid,
        bill_no: &str,
        cash_paise: i64,
        cheque_paise: i64,
        digital_paise: i64,
        reference: Option<&str>,
    ) -> Result<PaymentHint, DispatchError> {
        if cash_paise < 0 || cheque_paise < 0 || digital_paise < 0 {
            return Err(DispatchError::InvalidAmount(
                "payment hint portions cannot be negative".to_string(),
            ));
        }
        if cash_paise + cheque_paise + digital_paise == 0 {
            return Err(DispatchError::InvalidAmount(
                "payment hint must carry a non-zero amount".to_string(),
            ));
        }
        if !self.db.bill_exists(bill_no).await? {
            return Err(DispatchError::BillNotFound(bill_no.to_string()));
        }

        let session = self.require_active(session_id).await?;
        self.db
            .insert_payment_hint(
                bill_no,
                session.session_id,
                &session.cashier,
                cash_paise,
                cheque_paise,
                digital_paise,
                reference,
            )
            .await
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn record_petty_cash(
        &self,
        session_id: Uuid,
        amount_paise: i64,
        purpose: &str,
    ) -> Result<PettyCashEntry, DispatchError> {
        if amount_paise <= 0 {
            return Err(DispatchError::InvalidAmount(
                "petty cash amount must be positive".to_string(),
            ));
        }
        self.require_active(session_id).await?;
        self.db
            .insert_petty_cash(session_id, amount_paise, purpose)
            .await
    }

    #[instrument(skip(self), fields(session_id = %session_id, direction = direction.as_str()))]
    pub async fn record_adjustment(
        &self,
        session_id: Uuid,
        direction: AdjustmentDirection,
        amount_paise: i64,
        reason: &str,
    ) -> Result<TillAdjustment, DispatchError> {
        if amount_paise <= 0 {
            return Err(DispatchError::InvalidAmount(
                "adjustment amount must be positive".to_string(),
            ));
        }
        self.require_active(session_id).await?;
        self.db
            .insert_till_adjustment(session_id, direction.as_str(), amount_paise, reason)
            .await
    }

    /// Close a session: reconcile expected cash against the counted figure.
    ///
    /// A variance beyond the threshold flags the close for supervisory
    /// approval but never blocks it; approval is a separate later step.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn close(
        &self,
        session_id: Uuid,
        counted_paise: i64,
    ) -> Result<CashierSession, DispatchError> {
        if counted_paise < 0 {
            return Err(DispatchError::InvalidAmount(
                "counted cash cannot be negative".to_string(),
            ));
        }
        let session = self.require_active(session_id).await?;

        let expected = self.expected_for(&session).await?;
        let variance = variance_paise(counted_paise, expected);
        let needs_approval = breaches_threshold(variance, self.variance_threshold_paise);

        if needs_approval {
            warn!(
                session_id = %session_id,
                variance_paise = variance,
                threshold_paise = self.variance_threshold_paise,
                "Session variance breaches threshold, flagging for approval"
            );
        }

        let closed = self
            .db
            .close_session(session_id, counted_paise, expected, variance, needs_approval)
            .await?
            // The active check above ran outside any lock; losing the race
            // to a concurrent close surfaces here.
            .ok_or(DispatchError::SessionNotActive(session_id))?;

        info!(
            session_id = %session_id,
            expected_paise = expected,
            counted_paise = counted_paise,
            variance_paise = variance,
            needs_approval = needs_approval,
            "Cashier session closed"
        );

        Ok(closed)
    }

    /// Supervisory sign-off on a closed session.
    #[instrument(skip(self), fields(session_id = %session_id, approved_by = %approved_by))]
    pub async fn approve(
        &self,
        session_id: Uuid,
        approved_by: &str,
    ) -> Result<CashierSession, DispatchError> {
        match self.db.approve_session(session_id, approved_by).await? {
            Some(session) => Ok(session),
            None => {
                // Distinguish "no such session" from "not closed".
                match self.db.get_session(session_id).await? {
                    Some(_) => Err(DispatchError::SessionNotClosed(session_id)),
                    None => Err(DispatchError::SessionNotFound(session_id)),
                }
            }
        }
    }

    /// The session with its entries and a live expected-cash figure.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn view(&self, session_id: Uuid) -> Result<SessionView, DispatchError> {
        let session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or(DispatchError::SessionNotFound(session_id))?;

        let live_expected_paise = self.expected_for(&session).await?;

        Ok(SessionView {
            hints: self.db.hints_for_session(session_id).await?,
            petty_cash: self.db.petty_for_session(session_id).await?,
            adjustments: self.db.adjustments_for_session(session_id).await?,
            session,
            live_expected_paise,
        })
    }

    async fn expected_for(&self, session: &CashierSession) -> Result<i64, DispatchError> {
        let hint_cash = self.db.session_hint_cash_total(session.session_id).await?;
        let petty = self.db.session_petty_total(session.session_id).await?;
        let adjustment_net = self.db.session_adjustment_net(session.session_id).await?;
        Ok(expected_cash_paise(
            session.opening_float_paise,
            hint_cash,
            petty,
            adjustment_net,
        ))
    }

    async fn require_active(&self, session_id: Uuid) -> Result<CashierSession, DispatchError> {
        let session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or(DispatchError::SessionNotFound(session_id))?;
        if SessionStatus::from_str(&session.status) != SessionStatus::Active {
            return Err(DispatchError::SessionNotActive(session_id));
        }
        Ok(session)
    }
}
