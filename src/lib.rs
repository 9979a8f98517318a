//! # consult-ledger
//!
//! Booking, payment settlement and consultant earnings ledger for a
//! consulting marketplace.
//!
//! Clients book sessions with consultants and pay through a card gateway.
//! Gateway webhooks settle payments; a settled payment confirms the booking
//! and credits the consultant's earnings minus the platform commission.
//! Consultants withdraw against their available balance, and staff can
//! audit or adjust any consultant's ledger.
//!
//! ## Architecture
//!
//! ```text
//! Clients, payment gateway (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── BookingService · PaymentService · LedgerService (service/)
//!     ├── State machines, commission split (domain/)
//!     │
//!     ├── Store: MemoryStore | PostgresStore (persistence/)
//!     └── NotificationSink (notify)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod persistence;
pub mod service;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Builds the full HTTP application: API routes plus tracing and CORS
/// layers, bound to `state`.
pub fn build_app(state: AppState) -> Router {
    api::build_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
