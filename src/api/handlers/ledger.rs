//! Consultant-facing ledger handlers: earnings summary and withdrawals.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{EarningsSummaryResponse, WithdrawalDto, WithdrawalRequest};
use crate::app_state::AppState;
use crate::domain::Actor;
use crate::error::{ErrorResponse, LedgerError};

/// `GET /earnings` — The calling consultant's earnings and balance.
///
/// # Errors
///
/// Returns [`LedgerError::Forbidden`] for non-consultants.
#[utoipa::path(
    get,
    path = "/api/v1/earnings",
    tag = "Ledger",
    summary = "Earnings summary",
    description = "Lists the consultant's earnings with the gross total, the withdrawable balance and the net amount still pending.",
    responses(
        (status = 200, description = "Earnings summary", body = EarningsSummaryResponse),
        (status = 403, description = "Caller is not a consultant", body = ErrorResponse),
        (status = 404, description = "No consultant profile", body = ErrorResponse),
    )
)]
pub async fn earnings_summary(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse, LedgerError> {
    let summary = state.ledger.earnings_summary(&actor).await?;
    Ok(Json(EarningsSummaryResponse::from(summary)))
}

/// `POST /withdrawals` — Request a payout.
///
/// # Errors
///
/// Returns [`LedgerError::InsufficientBalance`] when the amount exceeds the
/// available balance.
#[utoipa::path(
    post,
    path = "/api/v1/withdrawals",
    tag = "Ledger",
    summary = "Request withdrawal",
    description = "Reserves the amount against the available balance as a PENDING withdrawal. Bank fields default to the consultant profile.",
    request_body = WithdrawalRequest,
    responses(
        (status = 201, description = "Withdrawal requested", body = WithdrawalDto),
        (status = 400, description = "Amount is not positive", body = ErrorResponse),
        (status = 403, description = "Caller is not a consultant", body = ErrorResponse),
        (status = 422, description = "Insufficient balance", body = ErrorResponse),
    )
)]
pub async fn request_withdrawal(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<WithdrawalRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let bank = req.bank();
    let withdrawal = state
        .ledger
        .request_withdrawal(&actor, req.amount, bank)
        .await?;
    Ok((StatusCode::CREATED, Json(WithdrawalDto::from(withdrawal))))
}

/// Ledger routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/earnings", get(earnings_summary))
        .route("/withdrawals", post(request_withdrawal))
}
