//! Domain errors for dispatch-service.

use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

/// Business and infrastructure failures surfaced by the service layer.
///
/// Rejections carry the state that caused them so the HTTP boundary can
/// answer with an actionable reason code.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("upstream source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("bill {0} not found")]
    BillNotFound(String),

    #[error("bill {bill_no} has already been released")]
    AlreadyReleased { bill_no: String },

    #[error("gatepass {gatepass_no} is already in use")]
    GatepassInUse { gatepass_no: String },

    #[error("bill {bill_no} has {remaining_due_paise} paise due and no valid approval")]
    ApprovalRequired {
        bill_no: String,
        remaining_due_paise: i64,
    },

    #[error("cashier {0} already has an active session")]
    DuplicateActiveSession(String),

    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("session {0} is not active")]
    SessionNotActive(Uuid),

    #[error("session {0} is not closed")]
    SessionNotClosed(Uuid),

    #[error("no release exists for bill {0}")]
    ReleaseNotFound(String),

    #[error("release for bill {0} is not a transporter release")]
    NotTransporterRelease(String),

    #[error("delivery already confirmed for bill {0}")]
    DeliveryAlreadyConfirmed(String),

    #[error("gatepass {0} does not belong to any release")]
    GatepassUnknown(String),

    #[error("gate entry already logged for gatepass {0}")]
    GateAlreadyLogged(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::SourceUnavailable(_) => AppError::BadGateway(err.to_string()),
            DispatchError::BillNotFound(_)
            | DispatchError::SessionNotFound(_)
            | DispatchError::ReleaseNotFound(_)
            | DispatchError::GatepassUnknown(_) => AppError::NotFound(anyhow::anyhow!("{}", err)),
            DispatchError::AlreadyReleased { .. } => {
                AppError::Conflict(anyhow::anyhow!("ALREADY_RELEASED: {}", err))
            }
            DispatchError::GatepassInUse { .. } => {
                AppError::Conflict(anyhow::anyhow!("GATEPASS_IN_USE: {}", err))
            }
            DispatchError::ApprovalRequired { .. } => {
                AppError::Forbidden(anyhow::anyhow!("APPROVAL_REQUIRED: {}", err))
            }
            DispatchError::DuplicateActiveSession(_) => {
                AppError::Conflict(anyhow::anyhow!("DUPLICATE_ACTIVE_SESSION: {}", err))
            }
            DispatchError::DeliveryAlreadyConfirmed(_) | DispatchError::GateAlreadyLogged(_) => {
                AppError::Conflict(anyhow::anyhow!("{}", err))
            }
            DispatchError::SessionNotActive(_)
            | DispatchError::SessionNotClosed(_)
            | DispatchError::NotTransporterRelease(_)
            | DispatchError::InvalidAmount(_) => AppError::BadRequest(anyhow::anyhow!("{}", err)),
            DispatchError::Store(e) => {
                crate::services::metrics::record_error("store");
                AppError::DatabaseError(anyhow::anyhow!("store error: {}", e))
            }
        }
    }
}

/// True when the underlying store rejected a write for violating a UNIQUE
/// constraint. Used to map backstop constraint hits onto business rejections.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}
