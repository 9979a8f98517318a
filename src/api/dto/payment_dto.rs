//! Payment DTOs, including the gateway webhook payload.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common_dto::PaginationMeta;
use crate::domain::{Payment, PaymentMethod, PaymentStatus};
use crate::error::LedgerError;
use crate::service::{CascadeOutcome, GatewayEvent, Reconciliation};

/// Request body for `POST /payments`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    /// Booking to pay for.
    pub booking_id: Uuid,
    /// Payment instrument.
    pub method: PaymentMethod,
    /// Gateway transaction id, when the client already has one.
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// Raw gateway response captured by the client.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub gateway_response: Option<serde_json::Value>,
}

/// Request body for `PUT /payments/{id}/status`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    /// Target status.
    pub status: PaymentStatus,
    /// Gateway transaction id to attach.
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// Reason for a failure.
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Query parameters for `GET /payments`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaymentListQuery {
    /// Restrict to one status (case-insensitive).
    #[serde(default)]
    pub status: Option<String>,
}

impl PaymentListQuery {
    /// Parses the status filter.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] for an unknown status.
    pub fn status(&self) -> Result<Option<PaymentStatus>, LedgerError> {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_uppercase().parse().map_err(LedgerError::InvalidRequest))
            .transpose()
    }
}

/// Payment as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentDto {
    /// Payment id.
    pub id: Uuid,
    /// Linked booking.
    pub booking_id: Option<Uuid>,
    /// Paying client.
    pub client_id: Option<Uuid>,
    /// Credited consultant.
    pub consultant_id: Option<Uuid>,
    /// Amount in major units.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Payment instrument.
    pub method: PaymentMethod,
    /// Settlement status.
    pub status: PaymentStatus,
    /// Gateway transaction id.
    pub transaction_id: Option<String>,
    /// Invoice number.
    pub invoice_number: String,
    /// Failure reason.
    pub failure_reason: Option<String>,
    /// Completion time.
    pub paid_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentDto {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id.into(),
            booking_id: p.booking_id.map(Into::into),
            client_id: p.client_id.map(Into::into),
            consultant_id: p.consultant_id.map(Into::into),
            amount: p.amount,
            currency: p.currency,
            method: p.method,
            status: p.status,
            transaction_id: p.transaction_id,
            invoice_number: p.invoice_number,
            failure_reason: p.failure_reason,
            paid_at: p.paid_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Paginated list response for `GET /payments`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentListResponse {
    /// Payments on this page.
    pub data: Vec<PaymentDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

// ── Gateway webhook ─────────────────────────────────────────────────────

/// `source` object of a gateway webhook.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct WebhookSource {
    /// Instrument type, e.g. `creditcard`, `mada`, `applepay`, `stcpay`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// `metadata` object of a gateway webhook, echoed from the intent.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct WebhookMetadata {
    /// Paying client's user id.
    #[serde(default, rename = "clientId")]
    pub client_id: Option<String>,
    /// Booking being paid.
    #[serde(default, rename = "bookingId")]
    pub booking_id: Option<String>,
}

/// Body of `POST /payments/webhook`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookPayload {
    /// Gateway transaction id.
    #[serde(default)]
    pub id: Option<String>,
    /// Gateway status.
    #[serde(default)]
    pub status: Option<String>,
    /// Amount in minor units.
    #[serde(default)]
    pub amount: Option<i64>,
    /// Currency code.
    #[serde(default)]
    pub currency: Option<String>,
    /// Payment source.
    #[serde(default)]
    pub source: Option<WebhookSource>,
    /// Metadata echoed from the payment intent.
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
}

fn metadata_uuid(field: &str, value: Option<&str>) -> Option<Uuid> {
    let raw = value.map(str::trim).filter(|v| !v.is_empty())?;
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!(field, value = raw, "ignoring malformed webhook metadata");
            None
        }
    }
}

impl WebhookPayload {
    /// Converts the payload into a gateway event, keeping `raw` for audit.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidPayload`] when `id` is missing or
    /// blank, or `amount` is missing or not positive.
    pub fn into_event(self, raw: serde_json::Value) -> Result<GatewayEvent, LedgerError> {
        let transaction_id = self
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| LedgerError::InvalidPayload("payment id is required".to_string()))?;
        let amount_minor = self.amount.filter(|a| *a > 0).ok_or_else(|| {
            LedgerError::InvalidPayload("payment amount must be positive".to_string())
        })?;
        let metadata = self.metadata.unwrap_or_default();
        Ok(GatewayEvent {
            transaction_id,
            status: self.status.unwrap_or_default(),
            amount_minor,
            currency: self.currency,
            source_type: self.source.and_then(|s| s.kind),
            booking_id: metadata_uuid("bookingId", metadata.booking_id.as_deref()).map(Into::into),
            client_id: metadata_uuid("clientId", metadata.client_id.as_deref()).map(Into::into),
            raw,
        })
    }
}

/// Response body of `POST /payments/webhook`.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    /// Always `true` once the payload was accepted.
    pub received: bool,
    /// Local payment id.
    pub payment_id: Uuid,
    /// Stored payment status.
    pub status: PaymentStatus,
    /// Whether this delivery created the payment row.
    pub created: bool,
    /// Settlement cascade result.
    pub cascade: CascadeOutcome,
}

impl From<Reconciliation> for WebhookAck {
    fn from(r: Reconciliation) -> Self {
        Self {
            received: true,
            payment_id: r.payment.id.into(),
            status: r.payment.status,
            created: r.created,
            cascade: r.cascade,
        }
    }
}
