//! Type-safe entity identifiers.
//!
//! Each identifier is a newtype wrapper around [`uuid::Uuid`] (v4) so that
//! a booking id can never be passed where a consultant id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a platform user (client, consultant or staff account).
    UserId
);
entity_id!(
    /// Identifier of a consultant profile. Distinct from the consultant's
    /// [`UserId`].
    ConsultantId
);
entity_id!(
    /// Identifier of a bookable service offered by consultants.
    ServiceId
);
entity_id!(
    /// Identifier of a booking.
    BookingId
);
entity_id!(
    /// Identifier of a payment row.
    PaymentId
);
entity_id!(
    /// Identifier of an earning ledger entry.
    EarningId
);
entity_id!(
    /// Identifier of a withdrawal request.
    WithdrawalId
);
entity_id!(
    /// Identifier of a notification row.
    NotificationId
);
