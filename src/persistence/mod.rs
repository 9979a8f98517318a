//! Persistence layer: the relational store behind the ledger.
//!
//! [`Store`] exposes one method per atomic command. Each method either
//! fully applies or leaves no trace, which is how the services get their
//! idempotence and race guarantees without holding in-process locks across
//! calls. Two backends implement it:
//!
//! - [`postgres::PostgresStore`]: `sqlx::PgPool`, one transaction per
//!   command, uniqueness constraints and row locks.
//! - [`memory::MemoryStore`]: a single `tokio::sync::Mutex` over plain
//!   maps, used when persistence is disabled and in tests.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::consultant::round_rating;
use crate::domain::{
    Booking, BookingId, BookingStatus, BookingType, Consultant, ConsultantId, Earning, Payment,
    PaymentId, PaymentStatus, UserId, Withdrawal,
};
use crate::error::LedgerError;

/// Row filter for booking listings.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Restrict to one client.
    pub client_id: Option<UserId>,
    /// Restrict to one consultant.
    pub consultant_id: Option<ConsultantId>,
    /// Accept any of these statuses; empty means all.
    pub statuses: Vec<BookingStatus>,
    /// Restrict to one booking type.
    pub booking_type: Option<BookingType>,
}

impl BookingFilter {
    /// Returns `true` if `booking` passes the filter.
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        self.client_id.is_none_or(|c| c == booking.client_id)
            && self.consultant_id.is_none_or(|c| c == booking.consultant_id)
            && (self.statuses.is_empty() || self.statuses.contains(&booking.status))
            && self.booking_type.is_none_or(|t| t == booking.booking_type)
    }
}

/// Row filter for payment listings.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    /// Restrict to one client.
    pub client_id: Option<UserId>,
    /// Restrict to one consultant.
    pub consultant_id: Option<ConsultantId>,
    /// Restrict to one status.
    pub status: Option<PaymentStatus>,
}

impl PaymentFilter {
    /// Returns `true` if `payment` passes the filter.
    #[must_use]
    pub fn matches(&self, payment: &Payment) -> bool {
        self.client_id.is_none_or(|c| payment.client_id == Some(c))
            && self
                .consultant_id
                .is_none_or(|c| payment.consultant_id == Some(c))
            && self.status.is_none_or(|s| s == payment.status)
    }
}

/// A compare-and-set booking status change.
#[derive(Debug, Clone)]
pub struct StatusChange {
    /// Status the booking must still have.
    pub expected: BookingStatus,
    /// Status to write.
    pub next: BookingStatus,
    /// Consultant notes to store, if any.
    pub consultant_notes: Option<String>,
    /// Mutation time; becomes `completed_at` when `next` is `COMPLETED`.
    pub at: DateTime<Utc>,
}

/// Manual payment status change.
#[derive(Debug, Clone)]
pub struct PaymentStatusUpdate {
    /// Target status.
    pub status: PaymentStatus,
    /// Gateway transaction id to attach.
    pub transaction_id: Option<String>,
    /// Reason for a failure.
    pub failure_reason: Option<String>,
    /// Mutation time.
    pub at: DateTime<Utc>,
}

/// Result of the find-or-create on a gateway transaction id.
#[derive(Debug, Clone)]
pub struct GatewayUpsert {
    /// Payment row after the command.
    pub payment: Payment,
    /// Status before the command; `None` when the row was created.
    pub previous_status: Option<PaymentStatus>,
    /// Whether the reported status was written. `false` when the stored
    /// status does not allow the reported transition.
    pub status_applied: bool,
}

/// Result of a balance-checked withdrawal insert.
#[derive(Debug, Clone)]
pub enum WithdrawalOutcome {
    /// Request stored.
    Created(Withdrawal),
    /// Requested amount exceeds the balance.
    Insufficient {
        /// Balance at the time of the check.
        available: Decimal,
    },
}

/// Cached aggregates of a consultant compared against the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct AggregateAudit {
    /// Audited consultant.
    #[schema(value_type = uuid::Uuid)]
    pub consultant_id: ConsultantId,
    /// `consultants.total_earnings` before the audit.
    pub cached_total_earnings: Decimal,
    /// Σ `earnings.net_amount`.
    pub ledger_total_earnings: Decimal,
    /// `consultants.rating` before the audit.
    pub cached_rating: Decimal,
    /// Average of all booking ratings.
    pub recomputed_rating: Decimal,
    /// `consultants.total_ratings` before the audit.
    pub cached_total_ratings: i32,
    /// Number of rated bookings.
    pub recomputed_total_ratings: i32,
    /// Whether the caches were overwritten.
    pub repaired: bool,
}

impl AggregateAudit {
    /// Builds an audit report from cached and recomputed values.
    #[must_use]
    pub fn compare(
        consultant: &Consultant,
        ledger_total_earnings: Decimal,
        rating_sum: i64,
        rating_count: i64,
    ) -> Self {
        let recomputed_rating = if rating_count == 0 {
            Decimal::ZERO
        } else {
            round_rating(Decimal::from(rating_sum) / Decimal::from(rating_count))
        };
        Self {
            consultant_id: consultant.id,
            cached_total_earnings: consultant.total_earnings,
            ledger_total_earnings,
            cached_rating: consultant.rating,
            recomputed_rating,
            cached_total_ratings: consultant.total_ratings,
            recomputed_total_ratings: i32::try_from(rating_count).unwrap_or(i32::MAX),
            repaired: false,
        }
    }

    /// Returns `true` if any cache disagrees with the ledger. Ratings are
    /// compared at two decimal places.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.cached_total_earnings != self.ledger_total_earnings
            || self.cached_total_ratings != self.recomputed_total_ratings
            || self.cached_rating.round_dp(2) != self.recomputed_rating.round_dp(2)
    }
}

/// The relational store shared by all services.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    // ── Consultant directory ──────────────────────────────────────────

    /// Loads a consultant by id.
    async fn get_consultant(&self, id: ConsultantId) -> Result<Option<Consultant>, LedgerError>;

    /// Loads the consultant profile owned by a user.
    async fn find_consultant_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Consultant>, LedgerError>;

    /// User ids of every admin-class account (admin, super admin, finance).
    async fn finance_recipients(&self) -> Result<Vec<UserId>, LedgerError>;

    /// The `commissionRate` system setting, if stored.
    async fn commission_rate_setting(&self) -> Result<Option<Decimal>, LedgerError>;

    // ── Bookings ──────────────────────────────────────────────────────

    /// Inserts a new booking.
    async fn insert_booking(&self, booking: &Booking) -> Result<(), LedgerError>;

    /// Loads a booking by id.
    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, LedgerError>;

    /// Lists bookings matching `filter`, newest `scheduled_at` first.
    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, LedgerError>;

    /// Applies a status change only if the booking still has
    /// `change.expected`. Returns `None` when the compare fails or the
    /// booking is gone.
    async fn transition_booking(
        &self,
        id: BookingId,
        change: &StatusChange,
    ) -> Result<Option<Booking>, LedgerError>;

    /// Sets the rating of a completed, unrated booking and folds it into
    /// the consultant's average in the same transaction. Returns `None`
    /// when the booking is not completed or was rated concurrently.
    async fn rate_booking(
        &self,
        id: BookingId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Option<Booking>, LedgerError>;

    /// Hard-deletes a booking. Linked payments keep their rows with the
    /// booking link cleared. Returns `false` if nothing was deleted.
    async fn delete_booking(&self, id: BookingId) -> Result<bool, LedgerError>;

    /// Marks a booking paid: links the payment, sets `payment_status`
    /// to `COMPLETED` and promotes `PENDING` to `CONFIRMED`. Other statuses
    /// are left alone.
    async fn settle_booking(
        &self,
        id: BookingId,
        payment_id: PaymentId,
    ) -> Result<Option<Booking>, LedgerError>;

    // ── Payments ──────────────────────────────────────────────────────

    /// Inserts a `PENDING` payment and links it to its booking with
    /// `payment_status = PENDING`, atomically.
    async fn insert_payment_intent(&self, payment: &Payment) -> Result<(), LedgerError>;

    /// Loads a payment by id.
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, LedgerError>;

    /// Lists payments matching `filter`, newest first.
    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, LedgerError>;

    /// Atomic find-or-create keyed by `candidate.transaction_id`. A new
    /// row is inserted as given; an existing row receives the candidate's
    /// status (when the transition is allowed) and gateway payload.
    async fn upsert_gateway_payment(
        &self,
        candidate: &Payment,
    ) -> Result<GatewayUpsert, LedgerError>;

    /// Applies a manual status change under a row lock.
    async fn update_payment_status(
        &self,
        id: PaymentId,
        update: &PaymentStatusUpdate,
    ) -> Result<Payment, LedgerError>;

    // ── Ledger ────────────────────────────────────────────────────────

    /// Inserts an earning unless one already exists for its payment, and
    /// increments the consultant's `total_earnings` only when inserted.
    /// Returns whether the row was inserted.
    async fn record_earning(&self, earning: &Earning) -> Result<bool, LedgerError>;

    /// Inserts a synthetic payment and its earning and applies the
    /// `total_earnings` change, in one transaction.
    async fn record_adjustment(
        &self,
        payment: &Payment,
        earning: &Earning,
    ) -> Result<(), LedgerError>;

    /// Withdrawable balance: available earnings minus pending withdrawals.
    async fn available_balance(&self, consultant_id: ConsultantId)
    -> Result<Decimal, LedgerError>;

    /// Checks the balance and inserts the withdrawal while holding a lock
    /// on the consultant, so concurrent requests serialize.
    async fn create_withdrawal(
        &self,
        withdrawal: &Withdrawal,
    ) -> Result<WithdrawalOutcome, LedgerError>;

    /// Earnings of a consultant, newest first.
    async fn list_earnings(&self, consultant_id: ConsultantId)
    -> Result<Vec<Earning>, LedgerError>;

    /// Withdrawals of a consultant, newest first.
    async fn list_withdrawals(
        &self,
        consultant_id: ConsultantId,
    ) -> Result<Vec<Withdrawal>, LedgerError>;

    /// Recomputes the consultant's cached aggregates from the ledger and,
    /// when `repair` is set and drift exists, overwrites them.
    async fn audit_consultant(
        &self,
        consultant_id: ConsultantId,
        repair: bool,
    ) -> Result<Option<AggregateAudit>, LedgerError>;
}
