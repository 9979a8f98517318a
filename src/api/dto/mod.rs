//! Data Transfer Objects for REST request/response serialization.
//!
//! Monetary amounts are [`rust_decimal::Decimal`] values serialized as JSON
//! strings so no precision is lost. Entity ids are plain UUIDs on the wire.

pub mod booking_dto;
pub mod common_dto;
pub mod ledger_dto;
pub mod payment_dto;

pub use booking_dto::*;
pub use common_dto::*;
pub use ledger_dto::*;
pub use payment_dto::*;
