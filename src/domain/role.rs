//! Caller roles and the authenticated actor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;

/// Platform role of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Books and pays for sessions.
    Client,
    /// Delivers sessions and earns from them.
    Consultant,
    /// Platform administrator.
    Admin,
    /// Administrator with unrestricted access.
    SuperAdmin,
    /// Finance staff; receives payout alerts.
    Finance,
}

impl Role {
    /// Roles allowed to manage bookings, payments and balances on behalf
    /// of other users.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }

    /// Roles notified about withdrawals and manual ledger adjustments.
    #[must_use]
    pub const fn receives_finance_alerts(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin | Self::Finance)
    }

    /// Wire representation (e.g. `"SUPER_ADMIN"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "CLIENT",
            Self::Consultant => "CONSULTANT",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Finance => "FINANCE",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLIENT" => Ok(Self::Client),
            "CONSULTANT" => Ok(Self::Consultant),
            "ADMIN" => Ok(Self::Admin),
            "SUPER_ADMIN" => Ok(Self::SuperAdmin),
            "FINANCE" => Ok(Self::Finance),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Caller's user id.
    pub user_id: UserId,
    /// Caller's role.
    pub role: Role,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Returns `true` if the actor has administrative rights.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
