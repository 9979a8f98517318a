//! Booking handlers: create, list, get, delete, status transitions and
//! ratings.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::dto::{
    BookingDto, BookingListQuery, BookingListResponse, CreateBookingRequest, PaginationParams,
    RateBookingRequest, UpdateBookingStatusRequest,
};
use crate::app_state::AppState;
use crate::domain::{Actor, BookingId};
use crate::error::{ErrorResponse, LedgerError};

/// `POST /bookings` — Book a session with a consultant.
///
/// # Errors
///
/// Returns [`LedgerError`] when the caller is not a client, the consultant
/// is unknown or the request is invalid.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    tag = "Bookings",
    summary = "Create a booking",
    description = "Creates a PENDING, unpaid booking for the calling client. The price defaults to the consultant's session price.",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = BookingDto),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Caller is not a client", body = ErrorResponse),
        (status = 404, description = "Consultant not found", body = ErrorResponse),
    )
)]
pub async fn create_booking(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let booking = state.bookings.create_booking(&actor, req.into()).await?;
    Ok((StatusCode::CREATED, Json(BookingDto::from(booking))))
}

/// `GET /bookings` — List bookings visible to the caller.
///
/// # Errors
///
/// Returns [`LedgerError`] on an unknown status filter or a role without
/// booking access.
#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    tag = "Bookings",
    summary = "List bookings",
    description = "Clients see their own bookings, consultants the bookings made with them, admins everything. Newest first.",
    params(PaginationParams, BookingListQuery),
    responses(
        (status = 200, description = "Paginated booking list", body = BookingListResponse),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
        (status = 403, description = "Role has no booking access", body = ErrorResponse),
    )
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<PaginationParams>,
    Query(query): Query<BookingListQuery>,
) -> Result<impl IntoResponse, LedgerError> {
    let bookings = state
        .bookings
        .list_bookings(&actor, query.statuses()?, query.booking_type)
        .await?;
    let (data, pagination) = params.paginate(bookings, BookingDto::from);
    Ok(Json(BookingListResponse { data, pagination }))
}

/// `GET /bookings/{id}` — Get one booking.
///
/// # Errors
///
/// Returns [`LedgerError::NotFound`] or [`LedgerError::Forbidden`].
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    summary = "Get booking",
    params(
        ("id" = uuid::Uuid, Path, description = "Booking UUID"),
    ),
    responses(
        (status = 200, description = "Booking details", body = BookingDto),
        (status = 403, description = "Not a party to the booking", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, LedgerError> {
    let booking = state.bookings.get_booking(&actor, BookingId::from(id)).await?;
    Ok(Json(BookingDto::from(booking)))
}

/// `DELETE /bookings/{id}` — Remove a booking (admins only).
///
/// # Errors
///
/// Returns [`LedgerError::NotFound`] or [`LedgerError::Forbidden`].
#[utoipa::path(
    delete,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    summary = "Delete booking",
    description = "Hard-deletes a booking. A linked payment keeps its row with the booking reference cleared.",
    params(
        ("id" = uuid::Uuid, Path, description = "Booking UUID"),
    ),
    responses(
        (status = 204, description = "Booking deleted"),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
    )
)]
pub async fn delete_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, LedgerError> {
    state
        .bookings
        .delete_booking(&actor, BookingId::from(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /bookings/{id}/status` — Move a booking through its lifecycle.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidState`] for a disallowed transition and
/// [`LedgerError::Forbidden`] when the caller may not make it.
#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}/status",
    tag = "Bookings",
    summary = "Update booking status",
    description = "Consultants confirm and complete their bookings; either party may cancel an open booking; admins may do all three.",
    params(
        ("id" = uuid::Uuid, Path, description = "Booking UUID"),
    ),
    request_body = UpdateBookingStatusRequest,
    responses(
        (status = 200, description = "Updated booking", body = BookingDto),
        (status = 403, description = "Transition not allowed for caller", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
        (status = 409, description = "Transition not allowed from current status", body = ErrorResponse),
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookingStatusRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let booking = state
        .bookings
        .transition_status(&actor, BookingId::from(id), req.status, req.consultant_notes)
        .await?;
    Ok(Json(BookingDto::from(booking)))
}

/// `PUT /bookings/{id}/cancel` — Cancel an open booking.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidState`] when the booking is already
/// completed or cancelled.
#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}/cancel",
    tag = "Bookings",
    summary = "Cancel booking",
    params(
        ("id" = uuid::Uuid, Path, description = "Booking UUID"),
    ),
    responses(
        (status = 200, description = "Cancelled booking", body = BookingDto),
        (status = 403, description = "Not a party to the booking", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
        (status = 409, description = "Booking is closed", body = ErrorResponse),
    )
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, LedgerError> {
    let booking = state
        .bookings
        .cancel_booking(&actor, BookingId::from(id))
        .await?;
    Ok(Json(BookingDto::from(booking)))
}

/// `POST /bookings/{id}/rate` — Rate a completed booking.
///
/// # Errors
///
/// Returns [`LedgerError`] when the caller is not the booking's client, the
/// booking is not completed or already rated, or the rating is out of
/// range.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/rate",
    tag = "Bookings",
    summary = "Rate booking",
    description = "Stores a 1-5 rating once per completed booking and folds it into the consultant's average.",
    params(
        ("id" = uuid::Uuid, Path, description = "Booking UUID"),
    ),
    request_body = RateBookingRequest,
    responses(
        (status = 200, description = "Rated booking", body = BookingDto),
        (status = 400, description = "Rating out of range", body = ErrorResponse),
        (status = 403, description = "Caller is not the booking's client", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
        (status = 409, description = "Not completed or already rated", body = ErrorResponse),
    )
)]
pub async fn rate_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<RateBookingRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let stars = req.stars();
    let booking = state
        .bookings
        .rate_booking(&actor, BookingId::from(id), stars, req.comment)
        .await?;
    Ok(Json(BookingDto::from(booking)))
}

/// Booking routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/{id}", get(get_booking).delete(delete_booking))
        .route("/bookings/{id}/status", put(update_status))
        .route("/bookings/{id}/cancel", put(cancel_booking))
        .route("/bookings/{id}/rate", post(rate_booking))
}
