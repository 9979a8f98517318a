//! Consultant earning ledger entries and the commission split.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::text_enum::text_enum;
use super::{ConsultantId, EarningId, PaymentId};

/// Decimal places kept for SAR amounts.
pub const MONEY_SCALE: u32 = 2;

text_enum! {
    /// Availability of an earning for withdrawal.
    pub enum EarningStatus {
        /// On hold; not yet withdrawable.
        Pending => "pending",
        /// Withdrawable.
        Available => "available",
        /// Consumed by an approved withdrawal.
        Withdrawn => "withdrawn",
    }
}

/// A consultant's net share of one completed payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Earning {
    /// Earning identifier.
    pub id: EarningId,
    /// Credited consultant.
    pub consultant_id: ConsultantId,
    /// Triggering payment (one-to-one).
    pub payment_id: PaymentId,
    /// Gross amount.
    pub amount: Decimal,
    /// Platform commission.
    pub platform_fee: Decimal,
    /// `amount - platform_fee`.
    pub net_amount: Decimal,
    /// Withdrawal availability.
    pub status: EarningStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Gross amount split into platform fee and consultant share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    /// Gross amount.
    pub amount: Decimal,
    /// Platform commission, rounded half-away-from-zero to 2 dp.
    pub platform_fee: Decimal,
    /// Consultant share.
    pub net_amount: Decimal,
}

impl CommissionSplit {
    /// Splits `amount` at `rate`.
    #[must_use]
    pub fn compute(amount: Decimal, rate: Decimal) -> Self {
        let platform_fee = (amount * rate)
            .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        Self {
            amount,
            platform_fee,
            net_amount: amount - platform_fee,
        }
    }

    /// A split with no commission, used for admin credits and deductions.
    #[must_use]
    pub fn fee_free(amount: Decimal) -> Self {
        Self {
            amount,
            platform_fee: Decimal::ZERO,
            net_amount: amount,
        }
    }
}

impl Earning {
    /// Builds an immediately withdrawable earning for `payment_id`.
    #[must_use]
    pub fn available(
        consultant_id: ConsultantId,
        payment_id: PaymentId,
        split: CommissionSplit,
    ) -> Self {
        Self {
            id: EarningId::new(),
            consultant_id,
            payment_id,
            amount: split.amount,
            platform_fee: split.platform_fee,
            net_amount: split.net_amount,
            status: EarningStatus::Available,
            created_at: Utc::now(),
        }
    }
}
