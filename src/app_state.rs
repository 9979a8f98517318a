//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::notify::NotificationSink;
use crate::persistence::Store;
use crate::service::{BookingService, LedgerService, PaymentService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Booking lifecycle and ratings.
    pub bookings: Arc<BookingService>,
    /// Payment intents and gateway reconciliation.
    pub payments: Arc<PaymentService>,
    /// Earnings, withdrawals and admin adjustments.
    pub ledger: Arc<LedgerService>,
}

impl AppState {
    /// Wires the service layer over one store and one notification sink.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn NotificationSink>,
        config: &LedgerConfig,
    ) -> Self {
        let ledger = Arc::new(LedgerService::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            config.commission_rate,
            config.currency.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            Arc::clone(&ledger),
        ));
        let bookings = Arc::new(BookingService::new(store, notifier));
        Self {
            bookings,
            payments,
            ledger,
        }
    }
}
