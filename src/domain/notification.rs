//! User notifications emitted as side effects of ledger operations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::text_enum::text_enum;
use super::{NotificationId, UserId};

text_enum! {
    /// Notification category.
    pub enum NotificationKind {
        /// A client booked a session.
        NewBooking => "NEW_BOOKING",
        /// The consultant accepted a booking.
        BookingConfirmed => "BOOKING_CONFIRMED",
        /// A booking was called off.
        BookingCancelled => "BOOKING_CANCELLED",
        /// A session was marked delivered.
        BookingCompleted => "BOOKING_COMPLETED",
        /// Money moved for the recipient.
        PaymentReceived => "PAYMENT_RECEIVED",
        /// A consultant asked for a payout.
        WithdrawalRequested => "WITHDRAWAL_REQUESTED",
        /// Staff-facing alert.
        AdminAlert => "ADMIN_ALERT",
    }
}

/// A message addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Notification identifier.
    pub id: NotificationId,
    /// Recipient.
    pub user_id: UserId,
    /// Category.
    pub kind: NotificationKind,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Frontend deep link.
    pub link: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Builds a notification stamped with the current time.
    #[must_use]
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            link: link.into(),
            created_at: Utc::now(),
        }
    }
}
