//! Consultant withdrawal requests.
//!
//! Only creation happens here. Approval, rejection and payout belong to the
//! admin back office, which also flips consumed earnings to `withdrawn`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::text_enum::text_enum;
use super::{ConsultantId, UserId, WithdrawalId};

text_enum! {
    /// Review status of a withdrawal.
    pub enum WithdrawalStatus {
        /// Awaiting admin review. Reserves balance.
        Pending => "PENDING",
        /// Approved, transfer not yet sent.
        Approved => "APPROVED",
        /// Declined by an admin.
        Rejected => "REJECTED",
        /// Transfer sent.
        Paid => "PAID",
    }
}

/// Destination account for a payout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BankDetails {
    /// Bank name.
    #[serde(default)]
    pub bank_name: Option<String>,
    /// Account number.
    #[serde(default)]
    pub account_number: Option<String>,
    /// IBAN.
    #[serde(default)]
    pub iban: Option<String>,
}

impl BankDetails {
    /// Fills missing fields from `fallback`.
    #[must_use]
    pub fn or(self, fallback: &Self) -> Self {
        Self {
            bank_name: self.bank_name.or_else(|| fallback.bank_name.clone()),
            account_number: self.account_number.or_else(|| fallback.account_number.clone()),
            iban: self.iban.or_else(|| fallback.iban.clone()),
        }
    }
}

/// A consultant's request to cash out available earnings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Withdrawal {
    /// Withdrawal identifier.
    pub id: WithdrawalId,
    /// Requesting consultant.
    pub consultant_id: ConsultantId,
    /// Requesting consultant's user account.
    pub user_id: UserId,
    /// Requested amount.
    pub amount: Decimal,
    /// Payout destination.
    pub bank: BankDetails,
    /// Review status.
    pub status: WithdrawalStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Withdrawal {
    /// Builds a new `PENDING` request.
    #[must_use]
    pub fn pending(
        consultant_id: ConsultantId,
        user_id: UserId,
        amount: Decimal,
        bank: BankDetails,
    ) -> Self {
        Self {
            id: WithdrawalId::new(),
            consultant_id,
            user_id,
            amount,
            bank,
            status: WithdrawalStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
