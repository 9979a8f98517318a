//! OpenAPI document for every REST endpoint.

use utoipa::OpenApi;

use crate::api::dto;
use crate::api::handlers::{admin, bookings, ledger, payments, system};

/// Generated OpenAPI description, served by Swagger UI when the
/// `swagger-ui` feature is on.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "consult-ledger",
        description = "Bookings, payment settlement and consultant earnings."
    ),
    paths(
        system::health_handler,
        bookings::create_booking,
        bookings::list_bookings,
        bookings::get_booking,
        bookings::delete_booking,
        bookings::update_status,
        bookings::cancel_booking,
        bookings::rate_booking,
        payments::create_payment,
        payments::list_payments,
        payments::get_payment,
        payments::update_payment_status,
        payments::webhook,
        ledger::earnings_summary,
        ledger::request_withdrawal,
        admin::consultant_earnings,
        admin::consultant_withdrawals,
        admin::credit,
        admin::deduct,
        admin::audit,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        system::HealthResponse,
        dto::PaginationMeta,
        dto::MessageResponse,
        dto::BookingDto,
        dto::BookingListResponse,
        dto::CreateBookingRequest,
        dto::UpdateBookingStatusRequest,
        dto::RateBookingRequest,
        dto::PaymentDto,
        dto::PaymentListResponse,
        dto::CreatePaymentRequest,
        dto::UpdatePaymentStatusRequest,
        dto::WebhookPayload,
        dto::WebhookSource,
        dto::WebhookMetadata,
        dto::WebhookAck,
        dto::EarningDto,
        dto::EarningsSummaryResponse,
        dto::WithdrawalRequest,
        dto::WithdrawalDto,
        dto::CreditRequest,
        dto::DeductRequest,
        dto::AdjustmentResponse,
        crate::persistence::AggregateAudit,
        crate::service::CascadeOutcome,
    )),
    tags(
        (name = "System", description = "Liveness"),
        (name = "Bookings", description = "Booking lifecycle and ratings"),
        (name = "Payments", description = "Payment intents and gateway settlement"),
        (name = "Ledger", description = "Consultant earnings and withdrawals"),
        (name = "Admin", description = "Staff ledger operations"),
    )
)]
pub struct ApiDoc;
