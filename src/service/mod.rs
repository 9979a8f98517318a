//! Service layer: business logic orchestration.
//!
//! - [`BookingService`] runs the booking lifecycle and ratings.
//! - [`PaymentService`] creates payment intents and reconciles gateway
//!   reports, cascading settlement into bookings and the ledger.
//! - [`LedgerService`] derives earnings and handles withdrawals and admin
//!   adjustments.
//!
//! Services are stateless coordinators over an `Arc<dyn Store>` and an
//! `Arc<dyn NotificationSink>`. Every mutation follows the same pattern:
//! authorize → validate → one atomic store command → log → notify.

pub mod booking_service;
pub mod ledger_service;
pub mod payment_service;

pub use booking_service::{BookingService, NewBooking};
pub use ledger_service::{Adjustment, EarningsSummary, LedgerService};
pub use payment_service::{CascadeOutcome, GatewayEvent, PaymentService, Reconciliation};

use crate::domain::{Actor, Consultant, ConsultantId};
use crate::error::LedgerError;
use crate::persistence::Store;

fn require_admin(actor: &Actor) -> Result<(), LedgerError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(LedgerError::Forbidden)
    }
}

async fn load_consultant(store: &dyn Store, id: ConsultantId) -> Result<Consultant, LedgerError> {
    store
        .get_consultant(id)
        .await?
        .ok_or_else(|| LedgerError::not_found("consultant", id))
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::{
        BankDetails, Payment, PaymentId, PaymentMethod, PaymentStatus, Role, UserId,
    };
    use crate::notify::MemoryNotifier;
    use crate::persistence::memory::MemoryStore;

    /// A wired service stack over the in-memory store with one consultant,
    /// one client and one admin registered.
    pub(crate) struct Fixture {
        pub store: Arc<MemoryStore>,
        pub notifier: MemoryNotifier,
        pub ledger: Arc<LedgerService>,
        pub payments: PaymentService,
        pub bookings: BookingService,
        pub consultant: Consultant,
        pub client: Actor,
        pub admin: Actor,
    }

    impl Fixture {
        pub(crate) async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let notifier = MemoryNotifier::new();
            let consultant = Consultant {
                id: ConsultantId::new(),
                user_id: UserId::new(),
                display_name: "Sara Al-Harbi".to_string(),
                is_available: true,
                price_per_session: dec!(500),
                rating: Decimal::ZERO,
                total_ratings: 0,
                total_earnings: Decimal::ZERO,
                bank: BankDetails {
                    bank_name: Some("Al Rajhi".to_string()),
                    account_number: Some("608010167519".to_string()),
                    iban: Some("SA0380000000608010167519".to_string()),
                },
            };
            store.upsert_consultant(consultant.clone()).await;
            let client = Actor::new(UserId::new(), Role::Client);
            let admin = Actor::new(UserId::new(), Role::Admin);
            store.register_user(client.user_id, client.role).await;
            store.register_user(admin.user_id, admin.role).await;

            let dyn_store: Arc<dyn Store> = Arc::clone(&store) as Arc<dyn Store>;
            let sink: Arc<dyn crate::notify::NotificationSink> = Arc::new(notifier.clone());
            let ledger = Arc::new(LedgerService::new(
                Arc::clone(&dyn_store),
                Arc::clone(&sink),
                dec!(0.15),
                "SAR",
            ));
            let payments =
                PaymentService::new(Arc::clone(&dyn_store), Arc::clone(&sink), Arc::clone(&ledger));
            let bookings = BookingService::new(dyn_store, sink);

            Self {
                store,
                notifier,
                ledger,
                payments,
                bookings,
                consultant,
                client,
                admin,
            }
        }

        pub(crate) fn consultant_actor(&self) -> Actor {
            Actor::new(self.consultant.user_id, Role::Consultant)
        }
    }

    /// A completed, booking-less payment crediting `consultant_id`.
    pub(crate) fn completed_payment(consultant_id: ConsultantId, amount: Decimal) -> Payment {
        let now = Utc::now();
        let id = PaymentId::new();
        Payment {
            id,
            booking_id: None,
            client_id: None,
            consultant_id: Some(consultant_id),
            amount,
            currency: "SAR".to_string(),
            method: PaymentMethod::CreditCard,
            status: PaymentStatus::Completed,
            transaction_id: Some(format!("pay_{id}")),
            invoice_number: format!("INV-{id}"),
            failure_reason: None,
            gateway_response: None,
            paid_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }
}
