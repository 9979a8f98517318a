//! Earnings, withdrawal and admin-adjustment DTOs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::payment_dto::PaymentDto;
use crate::domain::{BankDetails, Earning, EarningStatus, Withdrawal, WithdrawalStatus};
use crate::service::{Adjustment, EarningsSummary};

/// Earning row as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EarningDto {
    /// Earning id.
    pub id: Uuid,
    /// Credited consultant.
    pub consultant_id: Uuid,
    /// Triggering payment.
    pub payment_id: Uuid,
    /// Gross amount.
    pub amount: Decimal,
    /// Platform commission.
    pub platform_fee: Decimal,
    /// Consultant share.
    pub net_amount: Decimal,
    /// Availability.
    pub status: EarningStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<Earning> for EarningDto {
    fn from(e: Earning) -> Self {
        Self {
            id: e.id.into(),
            consultant_id: e.consultant_id.into(),
            payment_id: e.payment_id.into(),
            amount: e.amount,
            platform_fee: e.platform_fee,
            net_amount: e.net_amount,
            status: e.status,
            created_at: e.created_at,
        }
    }
}

/// Response body for `GET /earnings`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EarningsSummaryResponse {
    /// Consultant id.
    pub consultant_id: Uuid,
    /// Earning rows, newest first.
    pub earnings: Vec<EarningDto>,
    /// Gross amount across all earnings.
    pub total_earnings: Decimal,
    /// Withdrawable balance.
    pub available_balance: Decimal,
    /// Net amount not yet available.
    pub pending_earnings: Decimal,
}

impl From<EarningsSummary> for EarningsSummaryResponse {
    fn from(s: EarningsSummary) -> Self {
        Self {
            consultant_id: s.consultant_id.into(),
            earnings: s.earnings.into_iter().map(EarningDto::from).collect(),
            total_earnings: s.total_earnings,
            available_balance: s.available_balance,
            pending_earnings: s.pending_earnings,
        }
    }
}

/// Request body for `POST /withdrawals`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawalRequest {
    /// Amount to withdraw.
    pub amount: Decimal,
    /// Bank name; defaults to the profile.
    #[serde(default)]
    pub bank_name: Option<String>,
    /// Account number; defaults to the profile.
    #[serde(default)]
    pub account_number: Option<String>,
    /// IBAN; defaults to the profile.
    #[serde(default)]
    pub iban: Option<String>,
}

impl WithdrawalRequest {
    /// Bank details supplied with the request, if any.
    #[must_use]
    pub fn bank(&self) -> Option<BankDetails> {
        let bank = BankDetails {
            bank_name: self.bank_name.clone(),
            account_number: self.account_number.clone(),
            iban: self.iban.clone(),
        };
        (bank != BankDetails::default()).then_some(bank)
    }
}

/// Withdrawal as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WithdrawalDto {
    /// Withdrawal id.
    pub id: Uuid,
    /// Requesting consultant.
    pub consultant_id: Uuid,
    /// Requested amount.
    pub amount: Decimal,
    /// Payout destination.
    pub bank: BankDetails,
    /// Review status.
    pub status: WithdrawalStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalDto {
    fn from(w: Withdrawal) -> Self {
        Self {
            id: w.id.into(),
            consultant_id: w.consultant_id.into(),
            amount: w.amount,
            bank: w.bank,
            status: w.status,
            created_at: w.created_at,
        }
    }
}

/// Request body for `POST /admin/consultants/{id}/credit`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreditRequest {
    /// Amount to credit.
    pub amount: Decimal,
    /// Internal notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for `POST /admin/consultants/{id}/deduct`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeductRequest {
    /// Amount to deduct.
    pub amount: Decimal,
    /// Reason shown in the audit trail.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response body for admin credits and deductions.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdjustmentResponse {
    /// Synthetic payment.
    pub payment: PaymentDto,
    /// Matching earning.
    pub earning: EarningDto,
}

impl From<Adjustment> for AdjustmentResponse {
    fn from(a: Adjustment) -> Self {
        Self {
            payment: a.payment.into(),
            earning: a.earning.into(),
        }
    }
}

/// Query parameters for `POST /admin/consultants/{id}/audit`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Overwrite drifted caches.
    #[serde(default)]
    pub repair: bool,
}
