//! Booking lifecycle: creation, status transitions, ratings.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Actor, Booking, BookingDraft, BookingId, BookingStatus, BookingType, Consultant, ConsultantId,
    Notification, NotificationKind, Role, ServiceId, UserId,
};
use crate::error::LedgerError;
use crate::notify::{NotificationSink, deliver};
use crate::persistence::{BookingFilter, StatusChange, Store};

use super::{load_consultant, require_admin};

/// Input for [`BookingService::create_booking`].
#[derive(Debug, Clone)]
pub struct NewBooking {
    /// Consultant to book.
    pub consultant_id: ConsultantId,
    /// Booked service.
    pub service_id: ServiceId,
    /// Kind of engagement.
    pub booking_type: BookingType,
    /// Scheduled start.
    pub scheduled_at: DateTime<Utc>,
    /// Length in minutes.
    pub duration_minutes: i32,
    /// Explicit price; defaults to the consultant's session price.
    pub price: Option<Decimal>,
    /// Free-form notes from the client.
    pub client_notes: Option<String>,
}

/// Orchestrates the booking state machine.
#[derive(Debug, Clone)]
pub struct BookingService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn NotificationSink>,
}

impl BookingService {
    /// Creates a booking service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { store, notifier }
    }

    /// Books a session for the calling client.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] for non-clients,
    /// [`LedgerError::InvalidRequest`] for a non-positive duration or a
    /// negative price and [`LedgerError::NotFound`] if the consultant does
    /// not exist or is not taking bookings.
    pub async fn create_booking(
        &self,
        actor: &Actor,
        request: NewBooking,
    ) -> Result<Booking, LedgerError> {
        if actor.role != Role::Client {
            return Err(LedgerError::Forbidden);
        }
        if request.duration_minutes <= 0 {
            return Err(LedgerError::InvalidRequest(
                "duration must be positive".to_string(),
            ));
        }
        if request.price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(LedgerError::InvalidRequest(
                "price must not be negative".to_string(),
            ));
        }
        let consultant = load_consultant(self.store.as_ref(), request.consultant_id).await?;
        if !consultant.is_available {
            return Err(LedgerError::not_found("consultant", consultant.id));
        }

        let booking = Booking::from_draft(BookingDraft {
            client_id: actor.user_id,
            consultant_id: consultant.id,
            service_id: request.service_id,
            booking_type: request.booking_type,
            scheduled_at: request.scheduled_at,
            duration_minutes: request.duration_minutes,
            price: request.price.unwrap_or(consultant.price_per_session),
            client_notes: request.client_notes,
        });
        self.store.insert_booking(&booking).await?;
        tracing::info!(
            booking_id = %booking.id,
            consultant_id = %consultant.id,
            client_id = %actor.user_id,
            price = %booking.price,
            "booking created"
        );

        deliver(
            self.notifier.as_ref(),
            Notification::new(
                consultant.user_id,
                NotificationKind::NewBooking,
                "New Booking",
                format!(
                    "You have a new {} booking on {}",
                    booking.booking_type,
                    booking.scheduled_at.format("%Y-%m-%d %H:%M UTC")
                ),
                format!("/consultant/bookings/{}", booking.id),
            ),
        )
        .await;
        Ok(booking)
    }

    /// Moves a booking to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] for an unknown booking,
    /// [`LedgerError::Forbidden`] if the actor may not make this change and
    /// [`LedgerError::InvalidState`] if the transition is not allowed or
    /// the booking changed concurrently.
    pub async fn transition_status(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        next: BookingStatus,
        consultant_notes: Option<String>,
    ) -> Result<Booking, LedgerError> {
        let booking = self.load(booking_id).await?;
        let consultant = load_consultant(self.store.as_ref(), booking.consultant_id).await?;
        booking.check_transition(next, actor, consultant.user_id)?;

        let change = StatusChange {
            expected: booking.status,
            next,
            consultant_notes,
            at: Utc::now(),
        };
        let updated = self
            .store
            .transition_booking(booking_id, &change)
            .await?
            .ok_or_else(|| {
                LedgerError::InvalidState(format!("booking {booking_id} changed concurrently"))
            })?;
        tracing::info!(
            booking_id = %booking_id,
            from = %booking.status,
            to = %next,
            actor = %actor.user_id,
            "booking status changed"
        );

        self.notify_parties(actor, &updated, &consultant).await;
        Ok(updated)
    }

    /// Cancels a booking.
    ///
    /// # Errors
    ///
    /// Same as [`BookingService::transition_status`].
    pub async fn cancel_booking(
        &self,
        actor: &Actor,
        booking_id: BookingId,
    ) -> Result<Booking, LedgerError> {
        self.transition_status(actor, booking_id, BookingStatus::Cancelled, None)
            .await
    }

    /// Records the client's rating of a completed session and folds it into
    /// the consultant's average.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] for a rating outside 1–5,
    /// [`LedgerError::Forbidden`] if the actor is not the owning client and
    /// [`LedgerError::InvalidState`] if the booking is not completed or is
    /// already rated.
    pub async fn rate_booking(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Booking, LedgerError> {
        let booking = self.load(booking_id).await?;
        booking.check_rating(actor, rating)?;
        let rated = self
            .store
            .rate_booking(booking_id, rating, comment)
            .await?
            .ok_or_else(|| {
                LedgerError::InvalidState("booking has already been rated".to_string())
            })?;
        tracing::info!(
            booking_id = %booking_id,
            consultant_id = %rated.consultant_id,
            rating,
            "booking rated"
        );
        Ok(rated)
    }

    /// Loads a booking visible to `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] for an unknown booking and
    /// [`LedgerError::Forbidden`] if the actor is not a party to it.
    pub async fn get_booking(
        &self,
        actor: &Actor,
        booking_id: BookingId,
    ) -> Result<Booking, LedgerError> {
        let booking = self.load(booking_id).await?;
        let consultant_user = self.consultant_user(booking.consultant_id).await?;
        if !booking.is_visible_to(actor, consultant_user) {
            return Err(LedgerError::Forbidden);
        }
        Ok(booking)
    }

    /// Lists the bookings `actor` may see, newest `scheduled_at` first.
    ///
    /// Clients see their own bookings, consultants the ones assigned to
    /// them and admins every booking.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] for other roles and
    /// [`LedgerError::NotFound`] for a consultant without a profile.
    pub async fn list_bookings(
        &self,
        actor: &Actor,
        statuses: Vec<BookingStatus>,
        booking_type: Option<BookingType>,
    ) -> Result<Vec<Booking>, LedgerError> {
        let mut filter = BookingFilter {
            statuses,
            booking_type,
            ..BookingFilter::default()
        };
        match actor.role {
            Role::Client => filter.client_id = Some(actor.user_id),
            Role::Consultant => {
                let consultant = self
                    .store
                    .find_consultant_by_user(actor.user_id)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("consultant profile", actor.user_id))?;
                filter.consultant_id = Some(consultant.id);
            }
            Role::Admin | Role::SuperAdmin => {}
            Role::Finance => return Err(LedgerError::Forbidden),
        }
        self.store.list_bookings(&filter).await
    }

    /// Hard-deletes a booking. Payments keep their rows without the link.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] for non-admins and
    /// [`LedgerError::NotFound`] for an unknown booking.
    pub async fn delete_booking(
        &self,
        actor: &Actor,
        booking_id: BookingId,
    ) -> Result<(), LedgerError> {
        require_admin(actor)?;
        if !self.store.delete_booking(booking_id).await? {
            return Err(LedgerError::not_found("booking", booking_id));
        }
        tracing::info!(booking_id = %booking_id, admin_id = %actor.user_id, "booking deleted");
        Ok(())
    }

    async fn load(&self, booking_id: BookingId) -> Result<Booking, LedgerError> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("booking", booking_id))
    }

    async fn consultant_user(&self, consultant_id: ConsultantId) -> Result<UserId, LedgerError> {
        Ok(load_consultant(self.store.as_ref(), consultant_id)
            .await?
            .user_id)
    }

    /// Tells the other side of the booking about a status change. Admin
    /// changes reach both sides.
    async fn notify_parties(&self, actor: &Actor, booking: &Booking, consultant: &Consultant) {
        let (kind, title, verb) = match booking.status {
            BookingStatus::Confirmed => {
                (NotificationKind::BookingConfirmed, "Booking Confirmed", "confirmed")
            }
            BookingStatus::Completed => {
                (NotificationKind::BookingCompleted, "Session Completed", "completed")
            }
            BookingStatus::Cancelled => {
                (NotificationKind::BookingCancelled, "Booking Cancelled", "cancelled")
            }
            BookingStatus::Pending => return,
        };
        let recipients: Vec<(UserId, String)> = if actor.user_id == booking.client_id {
            vec![(consultant.user_id, format!("/consultant/bookings/{}", booking.id))]
        } else if actor.user_id == consultant.user_id {
            vec![(booking.client_id, format!("/bookings/{}", booking.id))]
        } else {
            vec![
                (booking.client_id, format!("/bookings/{}", booking.id)),
                (consultant.user_id, format!("/consultant/bookings/{}", booking.id)),
            ]
        };
        for (user_id, link) in recipients {
            let message = format!(
                "Your booking on {} has been {verb}",
                booking.scheduled_at.format("%Y-%m-%d")
            );
            deliver(
                self.notifier.as_ref(),
                Notification::new(user_id, kind, title, message, link),
            )
            .await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::service::tests::Fixture;
    use rust_decimal_macros::dec;

    fn request(consultant_id: ConsultantId) -> NewBooking {
        NewBooking {
            consultant_id,
            service_id: ServiceId::new(),
            booking_type: BookingType::VideoCall,
            scheduled_at: Utc::now(),
            duration_minutes: 60,
            price: None,
            client_notes: Some("first session".to_string()),
        }
    }

    async fn booked(fx: &Fixture) -> Booking {
        let Ok(booking) = fx
            .bookings
            .create_booking(&fx.client, request(fx.consultant.id))
            .await
        else {
            panic!("booking failed");
        };
        booking
    }

    #[tokio::test]
    async fn create_defaults_price_and_notifies_consultant() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        assert_eq!(booking.price, dec!(500));
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.client_id, fx.client.user_id);

        let inbox = fx.notifier.for_user(fx.consultant.user_id).await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(
            inbox.first().map(|n| n.kind),
            Some(NotificationKind::NewBooking)
        );
    }

    #[tokio::test]
    async fn only_clients_create_bookings() {
        let fx = Fixture::new().await;
        let result = fx
            .bookings
            .create_booking(&fx.consultant_actor(), request(fx.consultant.id))
            .await;
        assert!(matches!(result, Err(LedgerError::Forbidden)));
    }

    #[tokio::test]
    async fn unavailable_consultant_is_not_found() {
        let fx = Fixture::new().await;
        let mut away = fx.consultant.clone();
        away.is_available = false;
        fx.store.upsert_consultant(away).await;
        let result = fx
            .bookings
            .create_booking(&fx.client, request(fx.consultant.id))
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn consultant_completes_and_client_rates() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let consultant = fx.consultant_actor();

        let Ok(confirmed) = fx
            .bookings
            .transition_status(&consultant, booking.id, BookingStatus::Confirmed, None)
            .await
        else {
            panic!("confirm failed");
        };
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let Ok(completed) = fx
            .bookings
            .transition_status(
                &consultant,
                booking.id,
                BookingStatus::Completed,
                Some("covered the roadmap".to_string()),
            )
            .await
        else {
            panic!("complete failed");
        };
        assert!(completed.completed_at.is_some());
        assert_eq!(completed.consultant_notes.as_deref(), Some("covered the roadmap"));

        let Ok(rated) = fx
            .bookings
            .rate_booking(&fx.client, booking.id, 5, Some("great".to_string()))
            .await
        else {
            panic!("rating failed");
        };
        assert_eq!(rated.rating, Some(5));

        let again = fx.bookings.rate_booking(&fx.client, booking.id, 4, None).await;
        assert!(matches!(again, Err(LedgerError::InvalidState(_))));

        let Ok(Some(profile)) = fx.store.get_consultant(fx.consultant.id).await else {
            panic!("consultant missing");
        };
        assert_eq!(profile.rating, dec!(5));
        assert_eq!(profile.total_ratings, 1);
    }

    #[tokio::test]
    async fn rating_folds_into_existing_average() {
        let fx = Fixture::new().await;
        fx.store
            .upsert_consultant(Consultant {
                rating: dec!(4.0),
                total_ratings: 2,
                ..fx.consultant.clone()
            })
            .await;
        let booking = booked(&fx).await;
        let _ = fx
            .bookings
            .transition_status(&fx.admin, booking.id, BookingStatus::Completed, None)
            .await;

        let Ok(rated) = fx.bookings.rate_booking(&fx.client, booking.id, 4, None).await else {
            panic!("rating failed");
        };
        assert_eq!(rated.rating, Some(4));
        let Ok(Some(profile)) = fx.store.get_consultant(fx.consultant.id).await else {
            panic!("consultant missing");
        };
        assert_eq!(profile.rating, dec!(4));
        assert_eq!(profile.total_ratings, 3);

        let again = fx.bookings.rate_booking(&fx.client, booking.id, 5, None).await;
        assert!(matches!(again, Err(LedgerError::InvalidState(_))));
    }

    #[tokio::test]
    async fn client_cannot_confirm() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let result = fx
            .bookings
            .transition_status(&fx.client, booking.id, BookingStatus::Confirmed, None)
            .await;
        assert!(matches!(result, Err(LedgerError::Forbidden)));
    }

    #[tokio::test]
    async fn stranger_gets_forbidden_before_state_check() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let _ = fx.bookings.cancel_booking(&fx.client, booking.id).await;

        let stranger = Actor::new(UserId::new(), Role::Client);
        let result = fx.bookings.cancel_booking(&stranger, booking.id).await;
        assert!(matches!(result, Err(LedgerError::Forbidden)));
    }

    #[tokio::test]
    async fn cancelled_booking_cannot_complete() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let Ok(cancelled) = fx.bookings.cancel_booking(&fx.client, booking.id).await else {
            panic!("cancel failed");
        };
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let result = fx
            .bookings
            .transition_status(&fx.admin, booking.id, BookingStatus::Completed, None)
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidState(_))));

        let inbox = fx.notifier.for_user(fx.consultant.user_id).await;
        assert!(inbox.iter().any(|n| n.kind == NotificationKind::BookingCancelled));
    }

    #[tokio::test]
    async fn rating_out_of_range_is_invalid_request() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let result = fx.bookings.rate_booking(&fx.client, booking.id, 6, None).await;
        assert!(matches!(result, Err(LedgerError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn rating_before_completion_is_invalid_state() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let result = fx.bookings.rate_booking(&fx.client, booking.id, 4, None).await;
        assert!(matches!(result, Err(LedgerError::InvalidState(_))));
    }

    #[tokio::test]
    async fn visibility_and_listing_are_role_scoped() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;

        assert!(fx.bookings.get_booking(&fx.consultant_actor(), booking.id).await.is_ok());
        let stranger = Actor::new(UserId::new(), Role::Client);
        assert!(matches!(
            fx.bookings.get_booking(&stranger, booking.id).await,
            Err(LedgerError::Forbidden)
        ));

        let Ok(mine) = fx.bookings.list_bookings(&stranger, vec![], None).await else {
            panic!("list failed");
        };
        assert!(mine.is_empty());

        let Ok(all) = fx
            .bookings
            .list_bookings(&fx.admin, vec![BookingStatus::Pending], None)
            .await
        else {
            panic!("list failed");
        };
        assert_eq!(all.len(), 1);

        let Ok(none) = fx
            .bookings
            .list_bookings(&fx.admin, vec![BookingStatus::Completed], None)
            .await
        else {
            panic!("list failed");
        };
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn only_admin_deletes() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        assert!(matches!(
            fx.bookings.delete_booking(&fx.client, booking.id).await,
            Err(LedgerError::Forbidden)
        ));
        assert!(fx.bookings.delete_booking(&fx.admin, booking.id).await.is_ok());
        assert!(matches!(
            fx.bookings.delete_booking(&fx.admin, booking.id).await,
            Err(LedgerError::NotFound { .. })
        ));
    }
}
