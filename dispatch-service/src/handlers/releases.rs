//! Release command handlers: self pickup, transporter, delivery
//! confirmation, and the gate register.

use crate::dtos::{
    ConfirmDeliveryRequest, GateLogRequest, ReleaseDto, SelfReleaseRequest,
    TransporterReleaseRequest,
};
use crate::services::release::{
    ReleaseRequest, SelfReleaseDetails, TransporterReleaseDetails,
};
use crate::startup::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use service_core::error::AppError;
use validator::Validate;

#[tracing::instrument(skip(state, payload), fields(bill_no = %payload.bill_no))]
pub async fn release_self(
    State(state): State<AppState>,
    Json(payload): Json<SelfReleaseRequest>,
) -> Result<(StatusCode, Json<ReleaseDto>), AppError> {
    payload.validate()?;

    let details = SelfReleaseDetails {
        receiver_name: payload.receiver_name,
        receiver_phone: payload.receiver_phone,
    };
    let release = state
        .releases
        .release_self(
            ReleaseRequest {
                bill_no: payload.bill_no,
                gatepass_no: payload.gatepass_no,
                released_by: payload.released_by,
                approved_by: payload.approved_by,
                manager_pin: payload.manager_pin,
                otp_verified: payload.otp_verified,
            },
            details,
        )
        .await?;

    let self_detail = state.db.get_release_self(&release.bill_no).await?;
    Ok((
        StatusCode::CREATED,
        Json(ReleaseDto::new(&release, self_detail.as_ref(), None)),
    ))
}

#[tracing::instrument(skip(state, payload), fields(bill_no = %payload.bill_no))]
pub async fn release_transporter(
    State(state): State<AppState>,
    Json(payload): Json<TransporterReleaseRequest>,
) -> Result<(StatusCode, Json<ReleaseDto>), AppError> {
    payload.validate()?;

    let details = TransporterReleaseDetails {
        transporter_name: payload.transporter_name,
        vehicle_no: payload.vehicle_no,
        driver_name: payload.driver_name,
        driver_phone: payload.driver_phone,
        lr_no: payload.lr_no,
    };
    let release = state
        .releases
        .release_transporter(
            ReleaseRequest {
                bill_no: payload.bill_no,
                gatepass_no: payload.gatepass_no,
                released_by: payload.released_by,
                approved_by: payload.approved_by,
                manager_pin: payload.manager_pin,
                otp_verified: payload.otp_verified,
            },
            details,
        )
        .await?;

    let transporter_detail = state.db.get_release_transporter(&release.bill_no).await?;
    Ok((
        StatusCode::CREATED,
        Json(ReleaseDto::new(&release, None, transporter_detail.as_ref())),
    ))
}

#[tracing::instrument(skip(state, payload), fields(bill_no = %bill_no))]
pub async fn confirm_delivery(
    State(state): State<AppState>,
    Path(bill_no): Path<String>,
    Json(payload): Json<ConfirmDeliveryRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    state
        .releases
        .confirm_delivery(&bill_no, &payload.pod_reference)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, payload), fields(gatepass_no = %payload.gatepass_no))]
pub async fn log_gate_exit(
    State(state): State<AppState>,
    Json(payload): Json<GateLogRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    state
        .releases
        .log_gate_exit(
            &payload.gatepass_no,
            &payload.logged_by,
            payload.vehicle_no.as_deref(),
            payload.remarks.as_deref(),
        )
        .await?;
    Ok(StatusCode::CREATED)
}
