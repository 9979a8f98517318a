//! Consultant directory row and its cached aggregates.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::withdrawal::BankDetails;
use super::{ConsultantId, UserId};

/// A consultant profile as seen by the ledger.
///
/// `rating`, `total_ratings` and `total_earnings` are caches over the
/// bookings and earnings tables. They are updated in the same transaction
/// as their inputs and can be recomputed by an audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consultant {
    /// Consultant identifier.
    pub id: ConsultantId,
    /// Owning user account (notification target).
    pub user_id: UserId,
    /// Display name used in notifications.
    pub display_name: String,
    /// Whether new bookings are accepted.
    pub is_available: bool,
    /// Default price for a session.
    pub price_per_session: Decimal,
    /// Average client rating.
    pub rating: Decimal,
    /// Number of ratings in the average.
    pub total_ratings: i32,
    /// Sum of net earnings.
    pub total_earnings: Decimal,
    /// Payout defaults.
    pub bank: BankDetails,
}

/// Rounds an average rating to the stored precision (`NUMERIC(5,2)`).
#[must_use]
pub fn round_rating(average: Decimal) -> Decimal {
    average
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// New average and count after folding one more rating in.
#[must_use]
pub fn fold_rating(average: Decimal, count: i32, rating: u8) -> (Decimal, i32) {
    let next_count = count.saturating_add(1);
    let total = average * Decimal::from(count) + Decimal::from(rating);
    (round_rating(total / Decimal::from(next_count)), next_count)
}
