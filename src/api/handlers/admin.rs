//! Staff handlers over a single consultant's ledger.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::dto::{
    AdjustmentResponse, AuditQuery, CreditRequest, DeductRequest, EarningDto, WithdrawalDto,
};
use crate::app_state::AppState;
use crate::domain::{Actor, ConsultantId};
use crate::error::{ErrorResponse, LedgerError};
use crate::persistence::AggregateAudit;

/// `GET /admin/consultants/{id}/earnings` — A consultant's earnings.
///
/// # Errors
///
/// Returns [`LedgerError::Forbidden`] for non-staff callers.
#[utoipa::path(
    get,
    path = "/api/v1/admin/consultants/{id}/earnings",
    tag = "Admin",
    summary = "Consultant earnings",
    params(
        ("id" = uuid::Uuid, Path, description = "Consultant UUID"),
    ),
    responses(
        (status = 200, description = "Earnings, newest first", body = Vec<EarningDto>),
        (status = 403, description = "Caller is not staff", body = ErrorResponse),
        (status = 404, description = "Consultant not found", body = ErrorResponse),
    )
)]
pub async fn consultant_earnings(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, LedgerError> {
    let earnings = state
        .ledger
        .consultant_earnings(&actor, ConsultantId::from(id))
        .await?;
    Ok(Json(
        earnings.into_iter().map(EarningDto::from).collect::<Vec<_>>(),
    ))
}

/// `GET /admin/consultants/{id}/withdrawals` — A consultant's withdrawals.
///
/// # Errors
///
/// Returns [`LedgerError::Forbidden`] for non-staff callers.
#[utoipa::path(
    get,
    path = "/api/v1/admin/consultants/{id}/withdrawals",
    tag = "Admin",
    summary = "Consultant withdrawals",
    params(
        ("id" = uuid::Uuid, Path, description = "Consultant UUID"),
    ),
    responses(
        (status = 200, description = "Withdrawals, newest first", body = Vec<WithdrawalDto>),
        (status = 403, description = "Caller is not staff", body = ErrorResponse),
        (status = 404, description = "Consultant not found", body = ErrorResponse),
    )
)]
pub async fn consultant_withdrawals(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, LedgerError> {
    let withdrawals = state
        .ledger
        .consultant_withdrawals(&actor, ConsultantId::from(id))
        .await?;
    Ok(Json(
        withdrawals
            .into_iter()
            .map(WithdrawalDto::from)
            .collect::<Vec<_>>(),
    ))
}

/// `POST /admin/consultants/{id}/credit` — Manually credit a consultant.
///
/// # Errors
///
/// Returns [`LedgerError`] for non-admins, unknown consultants or a
/// non-positive amount.
#[utoipa::path(
    post,
    path = "/api/v1/admin/consultants/{id}/credit",
    tag = "Admin",
    summary = "Manual credit",
    description = "Records a completed manual payment and an immediately available, fee-free earning.",
    params(
        ("id" = uuid::Uuid, Path, description = "Consultant UUID"),
    ),
    request_body = CreditRequest,
    responses(
        (status = 201, description = "Credit recorded", body = AdjustmentResponse),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Consultant not found", body = ErrorResponse),
    )
)]
pub async fn credit(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<CreditRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let adjustment = state
        .ledger
        .manual_credit(&actor, ConsultantId::from(id), req.amount, req.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(AdjustmentResponse::from(adjustment))))
}

/// `POST /admin/consultants/{id}/deduct` — Manually debit a consultant.
///
/// # Errors
///
/// Returns [`LedgerError`] for non-admins, unknown consultants or a
/// non-positive amount.
#[utoipa::path(
    post,
    path = "/api/v1/admin/consultants/{id}/deduct",
    tag = "Admin",
    summary = "Manual deduction",
    description = "Records a negative completed payment and matching earning. The balance is not checked and may go negative.",
    params(
        ("id" = uuid::Uuid, Path, description = "Consultant UUID"),
    ),
    request_body = DeductRequest,
    responses(
        (status = 201, description = "Deduction recorded", body = AdjustmentResponse),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Consultant not found", body = ErrorResponse),
    )
)]
pub async fn deduct(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<DeductRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let adjustment = state
        .ledger
        .manual_deduction(&actor, ConsultantId::from(id), req.amount, req.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(AdjustmentResponse::from(adjustment))))
}

/// `POST /admin/consultants/{id}/audit` — Compare cached aggregates with
/// the ledger, optionally repairing them.
///
/// # Errors
///
/// Returns [`LedgerError`] for non-admins or unknown consultants.
#[utoipa::path(
    post,
    path = "/api/v1/admin/consultants/{id}/audit",
    tag = "Admin",
    summary = "Audit consultant aggregates",
    description = "Recomputes total earnings and rating from the ledger. With `repair=true` the cached values are overwritten.",
    params(
        ("id" = uuid::Uuid, Path, description = "Consultant UUID"),
        AuditQuery,
    ),
    responses(
        (status = 200, description = "Audit report", body = AggregateAudit),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Consultant not found", body = ErrorResponse),
    )
)]
pub async fn audit(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, LedgerError> {
    let report = state
        .ledger
        .audit_consultant(&actor, ConsultantId::from(id), query.repair)
        .await?;
    Ok(Json(report))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/consultants/{id}/earnings", get(consultant_earnings))
        .route("/admin/consultants/{id}/withdrawals", get(consultant_withdrawals))
        .route("/admin/consultants/{id}/credit", post(credit))
        .route("/admin/consultants/{id}/deduct", post(deduct))
        .route("/admin/consultants/{id}/audit", post(audit))
}
