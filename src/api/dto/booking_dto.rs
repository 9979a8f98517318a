//! Booking DTOs for create, transition, rate and list operations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common_dto::PaginationMeta;
use crate::domain::{Booking, BookingPaymentStatus, BookingStatus, BookingType};
use crate::error::LedgerError;
use crate::service::NewBooking;

fn default_duration() -> i32 {
    60
}

/// Request body for `POST /bookings`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    /// Consultant to book.
    pub consultant_id: Uuid,
    /// Booked service.
    pub service_id: Uuid,
    /// `VIDEO_CALL` or `CONSULTATION`.
    pub booking_type: BookingType,
    /// Scheduled start (RFC 3339).
    pub scheduled_at: DateTime<Utc>,
    /// Length in minutes. Defaults to 60.
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    /// Explicit price; defaults to the consultant's session price.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Free-form notes for the consultant.
    #[serde(default)]
    pub client_notes: Option<String>,
}

impl From<CreateBookingRequest> for NewBooking {
    fn from(req: CreateBookingRequest) -> Self {
        Self {
            consultant_id: req.consultant_id.into(),
            service_id: req.service_id.into(),
            booking_type: req.booking_type,
            scheduled_at: req.scheduled_at,
            duration_minutes: req.duration_minutes,
            price: req.price,
            client_notes: req.client_notes,
        }
    }
}

/// Request body for `PUT /bookings/{id}/status`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBookingStatusRequest {
    /// Target status.
    pub status: BookingStatus,
    /// Notes from the consultant, stored with the booking.
    #[serde(default)]
    pub consultant_notes: Option<String>,
}

/// Request body for `POST /bookings/{id}/rate`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RateBookingRequest {
    /// Stars, 1 to 5.
    pub rating: i64,
    /// Optional review text.
    #[serde(default)]
    pub comment: Option<String>,
}

impl RateBookingRequest {
    /// The rating as stored; values outside `u8` map to 0 and fail the
    /// range check downstream.
    #[must_use]
    pub fn stars(&self) -> u8 {
        u8::try_from(self.rating).unwrap_or(0)
    }
}

/// Query parameters for `GET /bookings`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookingListQuery {
    /// Comma-separated statuses, e.g. `PENDING,CONFIRMED`.
    #[serde(default)]
    pub status: Option<String>,
    /// Restrict to one booking type.
    #[serde(default)]
    pub booking_type: Option<BookingType>,
}

impl BookingListQuery {
    /// Parses the status list. Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] naming the first unknown
    /// status.
    pub fn statuses(&self) -> Result<Vec<BookingStatus>, LedgerError> {
        let Some(raw) = self.status.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_uppercase().parse().map_err(LedgerError::InvalidRequest))
            .collect()
    }
}

/// Booking as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingDto {
    /// Booking id.
    pub id: Uuid,
    /// Client user id.
    pub client_id: Uuid,
    /// Consultant id.
    pub consultant_id: Uuid,
    /// Service id.
    pub service_id: Uuid,
    /// Kind of engagement.
    pub booking_type: BookingType,
    /// Scheduled start.
    pub scheduled_at: DateTime<Utc>,
    /// Length in minutes.
    pub duration_minutes: i32,
    /// Agreed price.
    pub price: Decimal,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Mirrored payment state.
    pub payment_status: BookingPaymentStatus,
    /// Linked payment.
    pub payment_id: Option<Uuid>,
    /// Client rating.
    pub rating: Option<u8>,
    /// Rating comment.
    pub comment: Option<String>,
    /// Client notes.
    pub client_notes: Option<String>,
    /// Consultant notes.
    pub consultant_notes: Option<String>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingDto {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id.into(),
            client_id: b.client_id.into(),
            consultant_id: b.consultant_id.into(),
            service_id: b.service_id.into(),
            booking_type: b.booking_type,
            scheduled_at: b.scheduled_at,
            duration_minutes: b.duration_minutes,
            price: b.price,
            status: b.status,
            payment_status: b.payment_status,
            payment_id: b.payment_id.map(Into::into),
            rating: b.rating,
            comment: b.comment,
            client_notes: b.client_notes,
            consultant_notes: b.consultant_notes,
            completed_at: b.completed_at,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

/// Paginated list response for `GET /bookings`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingListResponse {
    /// Bookings on this page.
    pub data: Vec<BookingDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
