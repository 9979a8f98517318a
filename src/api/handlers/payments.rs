//! Payment handlers: intents, admin status updates and the gateway
//! webhook.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::dto::{
    CreatePaymentRequest, PaginationParams, PaymentDto, PaymentListQuery, PaymentListResponse,
    UpdatePaymentStatusRequest, WebhookAck, WebhookPayload,
};
use crate::app_state::AppState;
use crate::domain::{Actor, BookingId, PaymentId};
use crate::error::{ErrorResponse, LedgerError};

/// `POST /payments` — Create a payment intent for a booking.
///
/// # Errors
///
/// Returns [`LedgerError`] when the caller is not the booking's client or
/// the booking cannot be paid.
#[utoipa::path(
    post,
    path = "/api/v1/payments",
    tag = "Payments",
    summary = "Create payment intent",
    description = "Records a PENDING payment for the booking's price and links it to the booking. Settlement arrives through the webhook.",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment created", body = PaymentDto),
        (status = 403, description = "Not the booking's client", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
        (status = 409, description = "Booking cancelled or already paid", body = ErrorResponse),
    )
)]
pub async fn create_payment(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let payment = state
        .payments
        .create_payment_intent(
            &actor,
            BookingId::from(req.booking_id),
            req.method,
            req.transaction_id,
            req.gateway_response,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(PaymentDto::from(payment))))
}

/// `GET /payments` — List payments visible to the caller.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidRequest`] on an unknown status filter.
#[utoipa::path(
    get,
    path = "/api/v1/payments",
    tag = "Payments",
    summary = "List payments",
    description = "Clients see their own payments, consultants the payments credited to them, staff everything. Newest first.",
    params(PaginationParams, PaymentListQuery),
    responses(
        (status = 200, description = "Paginated payment list", body = PaymentListResponse),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
    )
)]
pub async fn list_payments(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<PaginationParams>,
    Query(query): Query<PaymentListQuery>,
) -> Result<impl IntoResponse, LedgerError> {
    let payments = state.payments.list_payments(&actor, query.status()?).await?;
    let (data, pagination) = params.paginate(payments, PaymentDto::from);
    Ok(Json(PaymentListResponse { data, pagination }))
}

/// `GET /payments/{id}` — Get one payment.
///
/// # Errors
///
/// Returns [`LedgerError::NotFound`] or [`LedgerError::Forbidden`].
#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}",
    tag = "Payments",
    summary = "Get payment",
    params(
        ("id" = uuid::Uuid, Path, description = "Payment UUID"),
    ),
    responses(
        (status = 200, description = "Payment details", body = PaymentDto),
        (status = 403, description = "Not a party to the payment", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse),
    )
)]
pub async fn get_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, LedgerError> {
    let payment = state.payments.get_payment(&actor, PaymentId::from(id)).await?;
    Ok(Json(PaymentDto::from(payment)))
}

/// `PUT /payments/{id}/status` — Override a payment's status (admins only).
///
/// # Errors
///
/// Returns [`LedgerError::InvalidState`] for a disallowed transition and
/// [`LedgerError::Forbidden`] for non-admins.
#[utoipa::path(
    put,
    path = "/api/v1/payments/{id}/status",
    tag = "Payments",
    summary = "Update payment status",
    description = "Applies a manual status change. Moving to COMPLETED runs the same settlement cascade as the webhook.",
    params(
        ("id" = uuid::Uuid, Path, description = "Payment UUID"),
    ),
    request_body = UpdatePaymentStatusRequest,
    responses(
        (status = 200, description = "Updated payment", body = PaymentDto),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse),
        (status = 409, description = "Transition not allowed", body = ErrorResponse),
    )
)]
pub async fn update_payment_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePaymentStatusRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let payment = state
        .payments
        .update_status(
            &actor,
            PaymentId::from(id),
            req.status,
            req.transaction_id,
            req.failure_reason,
        )
        .await?;
    Ok(Json(PaymentDto::from(payment)))
}

/// `POST /payments/webhook` — Receive a gateway settlement report.
///
/// Unauthenticated. Deliveries may repeat or arrive out of order; the
/// payment is keyed by the gateway's transaction id.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidPayload`] when the body is not JSON or
/// carries no payment id.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    tag = "Payments",
    summary = "Gateway webhook",
    description = "Creates or updates the payment for the reported transaction. A paid report settles the linked booking and credits the consultant exactly once.",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Report accepted", body = WebhookAck),
        (status = 400, description = "Malformed payload", body = ErrorResponse),
    )
)]
pub async fn webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, LedgerError> {
    let raw: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| LedgerError::InvalidPayload(format!("body is not JSON: {e}")))?;
    let payload: WebhookPayload = serde_json::from_value(raw.clone())
        .map_err(|e| LedgerError::InvalidPayload(e.to_string()))?;
    let event = payload.into_event(raw)?;
    tracing::info!(
        transaction_id = %event.transaction_id,
        status = %event.status,
        "gateway webhook received"
    );
    let reconciliation = state.payments.reconcile_gateway_event(event).await?;
    Ok(Json(WebhookAck::from(reconciliation)))
}

/// Payment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments", post(create_payment).get(list_payments))
        .route("/payments/webhook", post(webhook))
        .route("/payments/{id}", get(get_payment))
        .route("/payments/{id}/status", put(update_payment_status))
}
