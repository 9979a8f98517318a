//! Booking aggregate and its status state machine.
//!
//! ```text
//! PENDING ──► CONFIRMED ──► COMPLETED
//!    │            │
//!    └────────────┴──────► CANCELLED
//! ```
//!
//! `PENDING → COMPLETED` is also allowed (a session can be closed without an
//! explicit confirmation). `COMPLETED` and `CANCELLED` are terminal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::text_enum::text_enum;
use super::{Actor, BookingId, ConsultantId, PaymentId, Role, ServiceId, UserId};
use crate::error::LedgerError;

text_enum! {
    /// Lifecycle status of a booking.
    pub enum BookingStatus {
        /// Created by the client, awaiting the consultant.
        Pending => "PENDING",
        /// Accepted by the consultant or confirmed by payment.
        Confirmed => "CONFIRMED",
        /// Session delivered. Terminal.
        Completed => "COMPLETED",
        /// Called off by either party or an admin. Terminal.
        Cancelled => "CANCELLED",
    }
}

impl BookingStatus {
    /// Returns `true` for states that accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns `true` if the state machine allows `self → next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Completed)
                | (Self::Confirmed, Self::Completed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled)
        )
    }
}

text_enum! {
    /// Kind of engagement.
    pub enum BookingType {
        /// Live video session.
        VideoCall => "VIDEO_CALL",
        /// Asynchronous or in-person consultation.
        Consultation => "CONSULTATION",
    }
}

text_enum! {
    /// Payment state mirrored onto the booking.
    pub enum BookingPaymentStatus {
        /// No settled payment yet.
        Pending => "PENDING",
        /// A linked payment settled.
        Completed => "COMPLETED",
    }
}

/// A scheduled or completed consulting engagement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    /// Booking identifier.
    pub id: BookingId,
    /// User id of the client who booked.
    pub client_id: UserId,
    /// Consultant delivering the session.
    pub consultant_id: ConsultantId,
    /// Service being booked.
    pub service_id: ServiceId,
    /// Engagement kind.
    pub booking_type: BookingType,
    /// Scheduled start.
    pub scheduled_at: DateTime<Utc>,
    /// Session length in minutes.
    pub duration_minutes: i32,
    /// Agreed price.
    pub price: Decimal,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Mirrored payment state.
    pub payment_status: BookingPaymentStatus,
    /// Linked payment, once one exists.
    pub payment_id: Option<PaymentId>,
    /// Client rating (1–5), set at most once after completion.
    pub rating: Option<u8>,
    /// Client comment submitted with the rating.
    pub comment: Option<String>,
    /// Notes the client left when booking.
    pub client_notes: Option<String>,
    /// Notes the consultant left on a status change.
    pub consultant_notes: Option<String>,
    /// Set exactly when the booking becomes `COMPLETED`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new booking.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    /// Booking client.
    pub client_id: UserId,
    /// Consultant being booked.
    pub consultant_id: ConsultantId,
    /// Service being booked.
    pub service_id: ServiceId,
    /// Engagement kind.
    pub booking_type: BookingType,
    /// Scheduled start.
    pub scheduled_at: DateTime<Utc>,
    /// Session length in minutes.
    pub duration_minutes: i32,
    /// Resolved price.
    pub price: Decimal,
    /// Optional client notes.
    pub client_notes: Option<String>,
}

impl Booking {
    /// Builds a fresh `PENDING` booking from a draft.
    #[must_use]
    pub fn from_draft(draft: BookingDraft) -> Self {
        let now = Utc::now();
        Self {
            id: BookingId::new(),
            client_id: draft.client_id,
            consultant_id: draft.consultant_id,
            service_id: draft.service_id,
            booking_type: draft.booking_type,
            scheduled_at: draft.scheduled_at,
            duration_minutes: draft.duration_minutes,
            price: draft.price,
            status: BookingStatus::Pending,
            payment_status: BookingPaymentStatus::Pending,
            payment_id: None,
            rating: None,
            comment: None,
            client_notes: draft.client_notes,
            consultant_notes: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if `actor` owns the booking as its client.
    #[must_use]
    pub fn is_client(&self, actor: &Actor) -> bool {
        actor.user_id == self.client_id
    }

    /// Returns `true` if `actor` may read this booking.
    #[must_use]
    pub fn is_visible_to(&self, actor: &Actor, consultant_user: UserId) -> bool {
        actor.is_admin() || self.is_client(actor) || actor.user_id == consultant_user
    }

    /// Checks that `actor` may move this booking to `next`.
    ///
    /// Ownership is checked before the state machine so an unauthorized
    /// caller learns nothing about the booking's current state.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] on role or ownership mismatch and
    /// [`LedgerError::InvalidState`] if the transition is not allowed.
    pub fn check_transition(
        &self,
        next: BookingStatus,
        actor: &Actor,
        consultant_user: UserId,
    ) -> Result<(), LedgerError> {
        let is_assigned_consultant =
            actor.role == Role::Consultant && actor.user_id == consultant_user;
        let permitted = match next {
            _ if actor.is_admin() => true,
            BookingStatus::Cancelled => self.is_client(actor) || is_assigned_consultant,
            _ => is_assigned_consultant,
        };
        if !permitted {
            return Err(LedgerError::Forbidden);
        }
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidState(format!(
                "booking {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        Ok(())
    }

    /// Checks that `actor` may rate this booking now.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] for a rating outside 1–5,
    /// [`LedgerError::Forbidden`] if the actor is not the owning client, and
    /// [`LedgerError::InvalidState`] if the booking is not completed or was
    /// already rated.
    pub fn check_rating(&self, actor: &Actor, rating: u8) -> Result<(), LedgerError> {
        if !(1..=5).contains(&rating) {
            return Err(LedgerError::InvalidRequest(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        if actor.role != Role::Client || !self.is_client(actor) {
            return Err(LedgerError::Forbidden);
        }
        if self.status != BookingStatus::Completed {
            return Err(LedgerError::InvalidState(
                "can only rate completed bookings".to_string(),
            ));
        }
        if self.rating.is_some() {
            return Err(LedgerError::InvalidState(
                "booking has already been rated".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_booking(client: UserId, consultant: ConsultantId) -> Booking {
        Booking::from_draft(BookingDraft {
            client_id: client,
            consultant_id: consultant,
            service_id: ServiceId::new(),
            booking_type: BookingType::VideoCall,
            scheduled_at: Utc::now(),
            duration_minutes: 60,
            price: dec!(500),
            client_notes: None,
        })
    }

    #[test]
    fn terminal_states_are_isolated() {
        assert!(!BookingStatus::Completed.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Cancelled.can_transition_to(BookingStatus::Completed));
        for next in BookingStatus::ALL {
            assert!(!BookingStatus::Completed.can_transition_to(*next));
            assert!(!BookingStatus::Cancelled.can_transition_to(*next));
        }
    }

    #[test]
    fn nothing_returns_to_pending() {
        for from in BookingStatus::ALL {
            assert!(!from.can_transition_to(BookingStatus::Pending));
        }
    }

    #[test]
    fn client_may_cancel_but_not_confirm() {
        let client = UserId::new();
        let consultant_user = UserId::new();
        let booking = sample_booking(client, ConsultantId::new());
        let actor = Actor::new(client, Role::Client);

        assert!(
            booking
                .check_transition(BookingStatus::Cancelled, &actor, consultant_user)
                .is_ok()
        );
        assert!(matches!(
            booking.check_transition(BookingStatus::Confirmed, &actor, consultant_user),
            Err(LedgerError::Forbidden)
        ));
    }

    #[test]
    fn stranger_is_forbidden_before_state_is_checked() {
        let consultant_user = UserId::new();
        let mut booking = sample_booking(UserId::new(), ConsultantId::new());
        booking.status = BookingStatus::Completed;
        let stranger = Actor::new(UserId::new(), Role::Consultant);

        assert!(matches!(
            booking.check_transition(BookingStatus::Cancelled, &stranger, consultant_user),
            Err(LedgerError::Forbidden)
        ));
    }

    #[test]
    fn admin_still_bound_by_state_machine() {
        let mut booking = sample_booking(UserId::new(), ConsultantId::new());
        booking.status = BookingStatus::Cancelled;
        let admin = Actor::new(UserId::new(), Role::Admin);

        assert!(matches!(
            booking.check_transition(BookingStatus::Completed, &admin, UserId::new()),
            Err(LedgerError::InvalidState(_))
        ));
    }

    #[test]
    fn rating_rules() {
        let client = UserId::new();
        let mut booking = sample_booking(client, ConsultantId::new());
        let actor = Actor::new(client, Role::Client);

        assert!(matches!(
            booking.check_rating(&actor, 4),
            Err(LedgerError::InvalidState(_))
        ));

        booking.status = BookingStatus::Completed;
        assert!(booking.check_rating(&actor, 4).is_ok());
        assert!(matches!(
            booking.check_rating(&actor, 6),
            Err(LedgerError::InvalidRequest(_))
        ));

        let other = Actor::new(UserId::new(), Role::Client);
        assert!(matches!(
            booking.check_rating(&other, 4),
            Err(LedgerError::Forbidden)
        ));

        booking.rating = Some(5);
        assert!(matches!(
            booking.check_rating(&actor, 4),
            Err(LedgerError::InvalidState(_))
        ));
    }

    #[test]
    fn status_wire_names_round_trip() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(*status));
        }
        assert!("DONE".parse::<BookingStatus>().is_err());
    }
}
