//! Payment intents and gateway reconciliation.
//!
//! A payment reaches `COMPLETED` either through a gateway webhook or an
//! admin status change. Both paths run the same settlement cascade:
//!
//! ```text
//! payment COMPLETED
//!     ├── booking: payment_status = COMPLETED, PENDING → CONFIRMED
//!     └── ledger:  derive earning (once per payment)
//! ```
//!
//! Webhooks are replayed by the gateway, so the cascade is idempotent and a
//! failed cascade is retried by the next delivery.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::payment::{from_minor_units, generate_invoice_number};
use crate::domain::{
    Actor, BookingId, BookingPaymentStatus, BookingStatus, Notification, NotificationKind,
    Payment, PaymentId, PaymentMethod, PaymentStatus, Role, UserId,
};
use crate::error::LedgerError;
use crate::notify::{NotificationSink, deliver};
use crate::persistence::{PaymentFilter, PaymentStatusUpdate, Store};

use super::{LedgerService, require_admin};

/// A gateway report, already decoded from the webhook body.
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    /// Gateway transaction id; the idempotency key.
    pub transaction_id: String,
    /// Gateway status string (`paid`, `failed`, `refunded`, ...).
    pub status: String,
    /// Amount in minor units.
    pub amount_minor: i64,
    /// Currency code, if reported.
    pub currency: Option<String>,
    /// `source.type`, if reported.
    pub source_type: Option<String>,
    /// Booking named in the gateway metadata.
    pub booking_id: Option<BookingId>,
    /// Client named in the gateway metadata.
    pub client_id: Option<UserId>,
    /// Raw payload, stored for audit.
    pub raw: serde_json::Value,
}

/// What the settlement cascade did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CascadeOutcome {
    /// The payment is not completed; nothing to settle.
    Skipped,
    /// Booking and ledger are up to date.
    Settled {
        /// Booking marked paid, if linked.
        #[schema(value_type = Option<uuid::Uuid>)]
        booking_id: Option<BookingId>,
        /// Whether this run created the earning.
        earning_recorded: bool,
    },
    /// The cascade failed; the payment stays completed and a replay
    /// retries.
    Failed {
        /// Error description.
        error: String,
    },
}

/// Result of reconciling one gateway report.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Payment row after the upsert.
    pub payment: Payment,
    /// Whether this report created the row.
    pub created: bool,
    /// Whether the reported status was written.
    pub status_applied: bool,
    /// Settlement cascade result.
    pub cascade: CascadeOutcome,
}

/// Payment orchestration.
#[derive(Debug, Clone)]
pub struct PaymentService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn NotificationSink>,
    ledger: Arc<LedgerService>,
}

impl PaymentService {
    /// Creates a payment service settling into `ledger`.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn NotificationSink>,
        ledger: Arc<LedgerService>,
    ) -> Self {
        Self {
            store,
            notifier,
            ledger,
        }
    }

    /// Opens a `PENDING` payment for a booking, priced at the booking
    /// price.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] for an unknown booking,
    /// [`LedgerError::Forbidden`] unless the actor owns the booking or is an
    /// admin and [`LedgerError::InvalidState`] for a cancelled or already
    /// paid booking.
    pub async fn create_payment_intent(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        method: PaymentMethod,
        transaction_id: Option<String>,
        gateway_response: Option<serde_json::Value>,
    ) -> Result<Payment, LedgerError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("booking", booking_id))?;
        if !actor.is_admin() && !booking.is_client(actor) {
            return Err(LedgerError::Forbidden);
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(LedgerError::InvalidState(format!(
                "booking {booking_id} is cancelled"
            )));
        }
        if booking.payment_status == BookingPaymentStatus::Completed {
            return Err(LedgerError::InvalidState(format!(
                "booking {booking_id} is already paid"
            )));
        }

        let now = Utc::now();
        let payment = Payment {
            id: PaymentId::new(),
            booking_id: Some(booking.id),
            client_id: Some(booking.client_id),
            consultant_id: Some(booking.consultant_id),
            amount: booking.price,
            currency: self.ledger.currency().to_string(),
            method,
            status: PaymentStatus::Pending,
            transaction_id: transaction_id.filter(|t| !t.trim().is_empty()),
            invoice_number: generate_invoice_number(now),
            failure_reason: None,
            gateway_response,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_payment_intent(&payment).await?;
        tracing::info!(
            payment_id = %payment.id,
            booking_id = %booking.id,
            amount = %payment.amount,
            invoice = %payment.invoice_number,
            "payment intent created"
        );
        Ok(payment)
    }

    /// Applies a gateway report.
    ///
    /// Replays of the same transaction id converge on one payment row, one
    /// earning and one balance increment. Cascade failures are logged and
    /// reported in the result rather than returned, so the gateway does not
    /// see an error for a payment that did settle.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidPayload`] for a blank transaction id
    /// or a non-positive amount, and a persistence error if the payment
    /// itself cannot be written.
    pub async fn reconcile_gateway_event(
        &self,
        event: GatewayEvent,
    ) -> Result<Reconciliation, LedgerError> {
        let transaction_id = event.transaction_id.trim().to_string();
        if transaction_id.is_empty() {
            return Err(LedgerError::InvalidPayload(
                "payment id is required".to_string(),
            ));
        }
        if event.amount_minor <= 0 {
            tracing::warn!(
                %transaction_id,
                amount = event.amount_minor,
                "rejected non-positive gateway amount"
            );
            return Err(LedgerError::InvalidPayload(
                "payment amount must be positive".to_string(),
            ));
        }

        let booking = match event.booking_id {
            Some(id) => {
                let booking = self.store.get_booking(id).await?;
                if booking.is_none() {
                    tracing::warn!(booking_id = %id, %transaction_id, "gateway names unknown booking");
                }
                booking
            }
            None => None,
        };

        let now = Utc::now();
        let status = PaymentStatus::from_gateway(&event.status);
        let candidate = Payment {
            id: PaymentId::new(),
            booking_id: booking.as_ref().map(|b| b.id),
            client_id: event.client_id.or(booking.as_ref().map(|b| b.client_id)),
            consultant_id: booking.as_ref().map(|b| b.consultant_id),
            amount: from_minor_units(event.amount_minor),
            currency: event
                .currency
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| self.ledger.currency().to_string()),
            method: event
                .source_type
                .as_deref()
                .map_or(PaymentMethod::CreditCard, PaymentMethod::from_gateway_source),
            status,
            transaction_id: Some(transaction_id.clone()),
            invoice_number: generate_invoice_number(now),
            failure_reason: None,
            gateway_response: Some(event.raw),
            paid_at: (status == PaymentStatus::Completed).then_some(now),
            created_at: now,
            updated_at: now,
        };

        let upsert = self.store.upsert_gateway_payment(&candidate).await?;
        let payment = upsert.payment;
        if !upsert.status_applied {
            tracing::warn!(
                payment_id = %payment.id,
                %transaction_id,
                stored = %payment.status,
                reported = %status,
                "ignored disallowed gateway transition"
            );
        } else {
            tracing::info!(
                payment_id = %payment.id,
                %transaction_id,
                status = %payment.status,
                created = upsert.previous_status.is_none(),
                "gateway report applied"
            );
        }

        let cascade = if payment.is_settled() {
            match self.settle(&payment).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    tracing::error!(
                        payment_id = %payment.id,
                        %transaction_id,
                        %error,
                        "settlement cascade failed"
                    );
                    CascadeOutcome::Failed {
                        error: error.to_string(),
                    }
                }
            }
        } else {
            CascadeOutcome::Skipped
        };

        if payment.is_settled() && upsert.previous_status != Some(PaymentStatus::Completed) {
            self.notify_client(&payment).await;
        }
        Ok(Reconciliation {
            created: upsert.previous_status.is_none(),
            status_applied: upsert.status_applied,
            payment,
            cascade,
        })
    }

    /// Admin status change with the same settlement cascade as the webhook.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] for non-admins,
    /// [`LedgerError::NotFound`] for an unknown payment,
    /// [`LedgerError::InvalidState`] for a disallowed transition and any
    /// cascade error after the payment write has been committed.
    pub async fn update_status(
        &self,
        actor: &Actor,
        payment_id: PaymentId,
        status: PaymentStatus,
        transaction_id: Option<String>,
        failure_reason: Option<String>,
    ) -> Result<Payment, LedgerError> {
        require_admin(actor)?;
        let before = self.load(payment_id).await?;
        let update = PaymentStatusUpdate {
            status,
            transaction_id: transaction_id.filter(|t| !t.trim().is_empty()),
            failure_reason,
            at: Utc::now(),
        };
        let payment = self.store.update_payment_status(payment_id, &update).await?;
        tracing::info!(
            payment_id = %payment.id,
            from = %before.status,
            to = %payment.status,
            admin_id = %actor.user_id,
            "payment status updated"
        );

        if payment.is_settled() {
            self.settle(&payment).await?;
        }
        if before.status != payment.status {
            self.notify_client(&payment).await;
        }
        Ok(payment)
    }

    /// Loads a payment visible to `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] for an unknown payment and
    /// [`LedgerError::Forbidden`] if the actor is not a party to it.
    pub async fn get_payment(
        &self,
        actor: &Actor,
        payment_id: PaymentId,
    ) -> Result<Payment, LedgerError> {
        let payment = self.load(payment_id).await?;
        let visible = match actor.role {
            Role::Admin | Role::SuperAdmin | Role::Finance => true,
            Role::Client => payment.client_id == Some(actor.user_id),
            Role::Consultant => {
                let own = self.store.find_consultant_by_user(actor.user_id).await?;
                own.is_some_and(|c| payment.consultant_id == Some(c.id))
            }
        };
        if !visible {
            return Err(LedgerError::Forbidden);
        }
        Ok(payment)
    }

    /// Lists the payments `actor` may see, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] for a consultant without a
    /// profile.
    pub async fn list_payments(
        &self,
        actor: &Actor,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Payment>, LedgerError> {
        let mut filter = PaymentFilter {
            status,
            ..PaymentFilter::default()
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
            Role::Admin | Role::SuperAdmin | Role::Finance => {}
        }
        self.store.list_payments(&filter).await
    }

    async fn load(&self, payment_id: PaymentId) -> Result<Payment, LedgerError> {
        self.store
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("payment", payment_id))
    }

    /// Marks the linked booking paid and derives the earning. Safe to run
    /// any number of times for the same payment.
    async fn settle(&self, payment: &Payment) -> Result<CascadeOutcome, LedgerError> {
        let mut booking_id = None;
        if let Some(id) = payment.booking_id {
            match self.store.settle_booking(id, payment.id).await? {
                Some(booking) => {
                    if booking.status == BookingStatus::Cancelled {
                        tracing::warn!(
                            booking_id = %booking.id,
                            payment_id = %payment.id,
                            "payment settled for a cancelled booking"
                        );
                    }
                    booking_id = Some(booking.id);
                }
                None => {
                    tracing::warn!(booking_id = %id, payment_id = %payment.id, "linked booking is gone");
                }
            }
        }
        let earning = self.ledger.derive_earning(payment).await?;
        Ok(CascadeOutcome::Settled {
            booking_id,
            earning_recorded: earning.is_some(),
        })
    }

    /// Tells the client about the payment's current status.
    async fn notify_client(&self, payment: &Payment) {
        let Some(client_id) = payment.client_id else {
            return;
        };
        let amount = payment.amount.normalize();
        let (title, message) = match payment.status {
            PaymentStatus::Completed => (
                "Payment Successful",
                format!(
                    "Your payment of {amount} {} was received. Invoice {}",
                    payment.currency, payment.invoice_number
                ),
            ),
            PaymentStatus::Failed => (
                "Payment Failed",
                format!(
                    "Your payment of {amount} {} failed{}",
                    payment.currency,
                    payment
                        .failure_reason
                        .as_deref()
                        .map_or_else(String::new, |r| format!(": {r}"))
                ),
            ),
            PaymentStatus::Refunded => (
                "Payment Refunded",
                format!(
                    "Your payment of {amount} {} was refunded. Invoice {}",
                    payment.currency, payment.invoice_number
                ),
            ),
            PaymentStatus::Pending => (
                "Payment Pending",
                format!("Your payment of {amount} {} is pending", payment.currency),
            ),
        };
        deliver(
            self.notifier.as_ref(),
            Notification::new(
                client_id,
                NotificationKind::PaymentReceived,
                title,
                message,
                payment
                    .booking_id
                    .map_or_else(|| "/payments".to_string(), |id| format!("/bookings/{id}")),
            ),
        )
        .await;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Booking, BookingType, ServiceId};
    use crate::service::NewBooking;
    use crate::service::tests::Fixture;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    async fn booked(fx: &Fixture) -> Booking {
        let request = NewBooking {
            consultant_id: fx.consultant.id,
            service_id: ServiceId::new(),
            booking_type: BookingType::Consultation,
            scheduled_at: Utc::now(),
            duration_minutes: 45,
            price: None,
            client_notes: None,
        };
        let Ok(booking) = fx.bookings.create_booking(&fx.client, request).await else {
            panic!("booking failed");
        };
        booking
    }

    fn paid_event(tx: &str, booking_id: Option<BookingId>) -> GatewayEvent {
        GatewayEvent {
            transaction_id: tx.to_string(),
            status: "paid".to_string(),
            amount_minor: 50_000,
            currency: Some("SAR".to_string()),
            source_type: Some("mada".to_string()),
            booking_id,
            client_id: None,
            raw: serde_json::json!({"id": tx, "status": "paid"}),
        }
    }

    #[tokio::test]
    async fn webhook_settles_booking_and_ledger() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;

        let Ok(result) = fx
            .payments
            .reconcile_gateway_event(paid_event("pay_abc", Some(booking.id)))
            .await
        else {
            panic!("reconcile failed");
        };
        assert!(result.created);
        assert_eq!(result.payment.status, PaymentStatus::Completed);
        assert_eq!(result.payment.amount, dec!(500.00));
        assert_eq!(result.payment.method, PaymentMethod::Mada);
        assert_eq!(
            result.cascade,
            CascadeOutcome::Settled {
                booking_id: Some(booking.id),
                earning_recorded: true
            }
        );

        let Ok(Some(stored)) = fx.store.get_booking(booking.id).await else {
            panic!("booking missing");
        };
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.payment_status, BookingPaymentStatus::Completed);

        let Ok(Some(consultant)) = fx.store.get_consultant(fx.consultant.id).await else {
            panic!("consultant missing");
        };
        assert_eq!(consultant.total_earnings, dec!(425.00));
    }

    #[tokio::test]
    async fn webhook_replay_is_idempotent() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let first = fx
            .payments
            .reconcile_gateway_event(paid_event("pay_dup", Some(booking.id)))
            .await;
        let Ok(second) = fx
            .payments
            .reconcile_gateway_event(paid_event("pay_dup", Some(booking.id)))
            .await
        else {
            panic!("replay failed");
        };
        let Ok(first) = first else {
            panic!("first delivery failed");
        };
        assert_eq!(first.payment.id, second.payment.id);
        assert!(!second.created);
        assert_eq!(
            second.cascade,
            CascadeOutcome::Settled {
                booking_id: Some(booking.id),
                earning_recorded: false
            }
        );

        let Ok(earnings) = fx.store.list_earnings(fx.consultant.id).await else {
            panic!("list failed");
        };
        assert_eq!(earnings.len(), 1);
        let Ok(Some(consultant)) = fx.store.get_consultant(fx.consultant.id).await else {
            panic!("consultant missing");
        };
        assert_eq!(consultant.total_earnings, dec!(425.00));
    }

    #[tokio::test]
    async fn late_pending_report_does_not_regress() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let _ = fx
            .payments
            .reconcile_gateway_event(paid_event("pay_late", Some(booking.id)))
            .await;

        let mut stale = paid_event("pay_late", Some(booking.id));
        stale.status = "initiated".to_string();
        let Ok(result) = fx.payments.reconcile_gateway_event(stale).await else {
            panic!("reconcile failed");
        };
        assert!(!result.status_applied);
        assert_eq!(result.payment.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn failed_report_skips_cascade() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let mut event = paid_event("pay_fail", Some(booking.id));
        event.status = "failed".to_string();
        let Ok(result) = fx.payments.reconcile_gateway_event(event).await else {
            panic!("reconcile failed");
        };
        assert_eq!(result.payment.status, PaymentStatus::Failed);
        assert_eq!(result.cascade, CascadeOutcome::Skipped);

        let Ok(earnings) = fx.store.list_earnings(fx.consultant.id).await else {
            panic!("list failed");
        };
        assert!(earnings.is_empty());
    }

    #[tokio::test]
    async fn blank_transaction_id_is_invalid_payload() {
        let fx = Fixture::new().await;
        let result = fx
            .payments
            .reconcile_gateway_event(paid_event("  ", None))
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn completed_booking_stays_completed_on_settlement() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let _ = fx
            .bookings
            .transition_status(&fx.admin, booking.id, BookingStatus::Completed, None)
            .await;

        let _ = fx
            .payments
            .reconcile_gateway_event(paid_event("pay_after", Some(booking.id)))
            .await;
        let Ok(Some(stored)) = fx.store.get_booking(booking.id).await else {
            panic!("booking missing");
        };
        assert_eq!(stored.status, BookingStatus::Completed);
        assert_eq!(stored.payment_status, BookingPaymentStatus::Completed);
    }

    #[tokio::test]
    async fn intent_then_admin_completion() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let Ok(intent) = fx
            .payments
            .create_payment_intent(&fx.client, booking.id, PaymentMethod::ApplePay, None, None)
            .await
        else {
            panic!("intent failed");
        };
        assert_eq!(intent.status, PaymentStatus::Pending);
        assert_eq!(intent.amount, dec!(500));
        assert!(intent.invoice_number.starts_with("INV-"));

        let Ok(Some(linked)) = fx.store.get_booking(booking.id).await else {
            panic!("booking missing");
        };
        assert_eq!(linked.payment_id, Some(intent.id));

        let Ok(paid) = fx
            .payments
            .update_status(
                &fx.admin,
                intent.id,
                PaymentStatus::Completed,
                Some("txn_manual_1".to_string()),
                None,
            )
            .await
        else {
            panic!("update failed");
        };
        assert!(paid.paid_at.is_some());
        assert_eq!(paid.transaction_id.as_deref(), Some("txn_manual_1"));

        let Ok(Some(consultant)) = fx.store.get_consultant(fx.consultant.id).await else {
            panic!("consultant missing");
        };
        assert_eq!(consultant.total_earnings, dec!(425.00));

        let client_inbox = fx.notifier.for_user(fx.client.user_id).await;
        assert!(client_inbox
            .iter()
            .any(|n| n.kind == NotificationKind::PaymentReceived));
    }

    #[tokio::test]
    async fn refunded_payment_is_immutable() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let Ok(intent) = fx
            .payments
            .create_payment_intent(&fx.client, booking.id, PaymentMethod::CreditCard, None, None)
            .await
        else {
            panic!("intent failed");
        };
        let _ = fx
            .payments
            .update_status(&fx.admin, intent.id, PaymentStatus::Refunded, None, None)
            .await;
        let result = fx
            .payments
            .update_status(&fx.admin, intent.id, PaymentStatus::Completed, None, None)
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidState(_))));
    }

    #[tokio::test]
    async fn update_requires_admin_and_known_payment() {
        let fx = Fixture::new().await;
        assert!(matches!(
            fx.payments
                .update_status(&fx.client, PaymentId::new(), PaymentStatus::Completed, None, None)
                .await,
            Err(LedgerError::Forbidden)
        ));
        assert!(matches!(
            fx.payments
                .update_status(&fx.admin, PaymentId::new(), PaymentStatus::Completed, None, None)
                .await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn strangers_cannot_pay_for_others() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let stranger = Actor::new(UserId::new(), Role::Client);
        let result = fx
            .payments
            .create_payment_intent(&stranger, booking.id, PaymentMethod::Mada, None, None)
            .await;
        assert!(matches!(result, Err(LedgerError::Forbidden)));
    }

    #[tokio::test]
    async fn listings_are_role_scoped() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let _ = fx
            .payments
            .create_payment_intent(&fx.client, booking.id, PaymentMethod::Mada, None, None)
            .await;

        let Ok(own) = fx.payments.list_payments(&fx.client, None).await else {
            panic!("list failed");
        };
        assert_eq!(own.len(), 1);

        let stranger = Actor::new(UserId::new(), Role::Client);
        let Ok(other) = fx.payments.list_payments(&stranger, None).await else {
            panic!("list failed");
        };
        assert!(other.is_empty());

        let Ok(consultant_view) = fx
            .payments
            .list_payments(&fx.consultant_actor(), Some(PaymentStatus::Pending))
            .await
        else {
            panic!("list failed");
        };
        assert_eq!(consultant_view.len(), 1);
    }

    #[tokio::test]
    async fn non_positive_gateway_amount_changes_nothing() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        for amount in [-50_000, 0] {
            let mut event = paid_event("pay_negative", Some(booking.id));
            event.amount_minor = amount;
            let result = fx.payments.reconcile_gateway_event(event).await;
            assert!(matches!(result, Err(LedgerError::InvalidPayload(_))));
        }

        let Ok(payments) = fx.store.list_payments(&PaymentFilter::default()).await else {
            panic!("list failed");
        };
        assert!(payments.is_empty());
        let Ok(Some(stored)) = fx.store.get_booking(booking.id).await else {
            panic!("booking missing");
        };
        assert_eq!(stored.status, BookingStatus::Pending);
        assert_eq!(stored.payment_status, BookingPaymentStatus::Pending);
        let Ok(Some(consultant)) = fx.store.get_consultant(fx.consultant.id).await else {
            panic!("consultant missing");
        };
        assert_eq!(consultant.total_earnings, Decimal::ZERO);
    }

    #[tokio::test]
    async fn concurrent_deliveries_settle_once() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let (first, second) = tokio::join!(
            fx.payments
                .reconcile_gateway_event(paid_event("pay_race", Some(booking.id))),
            fx.payments
                .reconcile_gateway_event(paid_event("pay_race", Some(booking.id))),
        );
        let (Ok(first), Ok(second)) = (first, second) else {
            panic!("reconcile failed");
        };
        assert_eq!(first.payment.id, second.payment.id);
        assert_eq!(u8::from(first.created) + u8::from(second.created), 1);

        let Ok(payments) = fx.store.list_payments(&PaymentFilter::default()).await else {
            panic!("list failed");
        };
        assert_eq!(payments.len(), 1);
        let Ok(earnings) = fx.store.list_earnings(fx.consultant.id).await else {
            panic!("list failed");
        };
        assert_eq!(earnings.len(), 1);
        let Ok(Some(consultant)) = fx.store.get_consultant(fx.consultant.id).await else {
            panic!("consultant missing");
        };
        assert_eq!(consultant.total_earnings, dec!(425.00));
    }

    #[tokio::test]
    async fn admin_changes_notify_the_client() {
        let fx = Fixture::new().await;
        let booking = booked(&fx).await;
        let Ok(intent) = fx
            .payments
            .create_payment_intent(&fx.client, booking.id, PaymentMethod::Mada, None, None)
            .await
        else {
            panic!("intent failed");
        };
        let Ok(_) = fx
            .payments
            .update_status(
                &fx.admin,
                intent.id,
                PaymentStatus::Failed,
                None,
                Some("card declined".to_string()),
            )
            .await
        else {
            panic!("fail update failed");
        };
        let Ok(_) = fx
            .payments
            .update_status(&fx.admin, intent.id, PaymentStatus::Completed, None, None)
            .await
        else {
            panic!("complete update failed");
        };
        let Ok(_) = fx
            .payments
            .update_status(&fx.admin, intent.id, PaymentStatus::Refunded, None, None)
            .await
        else {
            panic!("refund update failed");
        };

        let titles: Vec<String> = fx
            .notifier
            .for_user(fx.client.user_id)
            .await
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(
            titles,
            ["Payment Failed", "Payment Successful", "Payment Refunded"]
        );
    }
}
