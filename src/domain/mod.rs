//! Domain layer: entities, identifiers and the pure state-machine rules.
//!
//! Nothing in this module touches the store or the network. Services load
//! entities, ask the domain whether a change is allowed, and then hand the
//! change to the store as one atomic command.

mod text_enum;

pub mod booking;
pub mod consultant;
pub mod earning;
pub mod ids;
pub mod notification;
pub mod payment;
pub mod role;
pub mod withdrawal;

pub use booking::{Booking, BookingDraft, BookingPaymentStatus, BookingStatus, BookingType};
pub use consultant::Consultant;
pub use earning::{CommissionSplit, Earning, EarningStatus};
pub use ids::{
    BookingId, ConsultantId, EarningId, NotificationId, PaymentId, ServiceId, UserId,
    WithdrawalId,
};
pub use notification::{Notification, NotificationKind};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use role::{Actor, Role};
pub use withdrawal::{BankDetails, Withdrawal, WithdrawalStatus};
