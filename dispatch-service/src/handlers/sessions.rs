//! Cashier session handlers.

use crate::dtos::{
    ApproveSessionRequest, CloseSessionRequest, OpenSessionRequest, PaymentHintDto,
    PaymentHintRequest, PettyCashDto, PettyCashRequest, SessionDetailResponse, SessionDto,
    TillAdjustmentDto, TillAdjustmentRequest,
};
use crate::handlers::{parse_money, parse_money_opt};
use crate::models::AdjustmentDirection;
use crate::startup::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

#[tracing::instrument(skip(state, payload), fields(cashier = %payload.cashier))]
pub async fn open_session(
    State(state): State<AppState>,
    Json(payload): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionDto>), AppError> {
    payload.validate()?;
    let opening_float = parse_money("opening_float", &payload.opening_float)?;
    let session = state.sessions.open(&payload.cashier, opening_float).await?;
    Ok((StatusCode::CREATED, Json(SessionDto::from(&session))))
}

#[tracing::instrument(skip(state), fields(session_id = %session_id))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionDetailResponse>, AppError> {
    let view = state.sessions.view(session_id).await?;
    Ok(Json(SessionDetailResponse::from(&view)))
}

#[tracing::instrument(skip(state, payload), fields(session_id = %session_id))]
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<CloseSessionRequest>,
) -> Result<Json<SessionDto>, AppError> {
    payload.validate()?;
    let counted = parse_money("counted_cash", &payload.counted_cash)?;
    let session = state.sessions.close(session_id, counted).await?;
    Ok(Json(SessionDto::from(&session)))
}

#[tracing::instrument(skip(state, payload), fields(session_id = %session_id))]
pub async fn approve_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<ApproveSessionRequest>,
) -> Result<Json<SessionDto>, AppError> {
    payload.validate()?;
    let session = state
        .sessions
        .approve(session_id, &payload.approved_by)
        .await?;
    Ok(Json(SessionDto::from(&session)))
}

#[tracing::instrument(skip(state, payload), fields(session_id = %session_id))]
pub async fn record_petty_cash(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<PettyCashRequest>,
) -> Result<(StatusCode, Json<PettyCashDto>), AppError> {
    payload.validate()?;
    let amount = parse_money("amount", &payload.amount)?;
    let entry = state
        .sessions
        .record_petty_cash(session_id, amount, &payload.purpose)
        .await?;
    Ok((StatusCode::CREATED, Json(PettyCashDto::from(&entry))))
}

#[tracing::instrument(skip(state, payload), fields(session_id = %session_id))]
pub async fn record_adjustment(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<TillAdjustmentRequest>,
) -> Result<(StatusCode, Json<TillAdjustmentDto>), AppError> {
    payload.validate()?;
    let amount = parse_money("amount", &payload.amount)?;
    let direction = AdjustmentDirection::from_str(&payload.direction);
    let adjustment = state
        .sessions
        .record_adjustment(session_id, direction, amount, &payload.reason)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TillAdjustmentDto::from(&adjustment)),
    ))
}

#[tracing::instrument(skip(state, payload), fields(bill_no = %payload.bill_no))]
pub async fn record_payment_hint(
    State(state): State<AppState>,
    Json(payload): Json<PaymentHintRequest>,
) -> Result<(StatusCode, Json<PaymentHintDto>), AppError> {
    payload.validate()?;
    let cash = parse_money_opt("cash", payload.cash.as_deref())?;
    let cheque = parse_money_opt("cheque", payload.cheque.as_deref())?;
    let digital = parse_money_opt("digital", payload.digital.as_deref())?;

    let hint = state
        .sessions
        .record_payment_hint(
            payload.session_id,
            &payload.bill_no,
            cash,
            cheque,
            digital,
            payload.reference.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(PaymentHintDto::from(&hint))))
}
