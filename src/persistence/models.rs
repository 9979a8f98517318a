//! Database row models and their conversion into domain entities.
//!
//! Enum columns are stored as `TEXT` using each enum's wire name; an
//! unknown value in the database surfaces as a
//! [`LedgerError::Persistence`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    BankDetails, Booking, Consultant, Earning, Payment, Withdrawal,
};
use crate::error::LedgerError;

/// Column list matching [`BookingRow`].
pub const BOOKING_COLUMNS: &str = "id, client_id, consultant_id, service_id, booking_type, \
     scheduled_at, duration_minutes, price, status, payment_status, payment_id, rating, \
     comment, client_notes, consultant_notes, completed_at, created_at, updated_at";

/// Column list matching [`PaymentRow`].
pub const PAYMENT_COLUMNS: &str = "id, booking_id, client_id, consultant_id, amount, currency, \
     method, status, transaction_id, invoice_number, failure_reason, gateway_response, \
     paid_at, created_at, updated_at";

/// Column list matching [`EarningRow`].
pub const EARNING_COLUMNS: &str =
    "id, consultant_id, payment_id, amount, platform_fee, net_amount, status, created_at";

/// Column list matching [`WithdrawalRow`].
pub const WITHDRAWAL_COLUMNS: &str = "id, consultant_id, user_id, amount, bank_name, \
     account_number, iban, status, created_at";

/// Column list matching [`ConsultantRow`].
pub const CONSULTANT_COLUMNS: &str = "id, user_id, display_name, is_available, \
     price_per_session, rating, total_ratings, total_earnings, bank_name, bank_account, iban";

fn parse_column<T: FromStr<Err = String>>(value: &str) -> Result<T, LedgerError> {
    value.parse().map_err(LedgerError::Persistence)
}

/// A row of the `bookings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    /// Primary key.
    pub id: Uuid,
    /// Client user id.
    pub client_id: Uuid,
    /// Consultant id.
    pub consultant_id: Uuid,
    /// Service id.
    pub service_id: Uuid,
    /// `VIDEO_CALL` or `CONSULTATION`.
    pub booking_type: String,
    /// Scheduled start.
    pub scheduled_at: DateTime<Utc>,
    /// Minutes.
    pub duration_minutes: i32,
    /// Agreed price.
    pub price: Decimal,
    /// Lifecycle status.
    pub status: String,
    /// Mirrored payment state.
    pub payment_status: String,
    /// Linked payment.
    pub payment_id: Option<Uuid>,
    /// Client rating.
    pub rating: Option<i16>,
    /// Rating comment.
    pub comment: Option<String>,
    /// Client notes.
    pub client_notes: Option<String>,
    /// Consultant notes.
    pub consultant_notes: Option<String>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = LedgerError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let rating = row
            .rating
            .map(u8::try_from)
            .transpose()
            .map_err(|e| LedgerError::Persistence(format!("bad rating column: {e}")))?;
        Ok(Self {
            id: row.id.into(),
            client_id: row.client_id.into(),
            consultant_id: row.consultant_id.into(),
            service_id: row.service_id.into(),
            booking_type: parse_column(&row.booking_type)?,
            scheduled_at: row.scheduled_at,
            duration_minutes: row.duration_minutes,
            price: row.price,
            status: parse_column(&row.status)?,
            payment_status: parse_column(&row.payment_status)?,
            payment_id: row.payment_id.map(Into::into),
            rating,
            comment: row.comment,
            client_notes: row.client_notes,
            consultant_notes: row.consultant_notes,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row of the `payments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    /// Primary key.
    pub id: Uuid,
    /// Linked booking.
    pub booking_id: Option<Uuid>,
    /// Paying client.
    pub client_id: Option<Uuid>,
    /// Credited consultant.
    pub consultant_id: Option<Uuid>,
    /// Amount in SAR.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Payment method.
    pub method: String,
    /// Settlement status.
    pub status: String,
    /// Gateway transaction id.
    pub transaction_id: Option<String>,
    /// Invoice number.
    pub invoice_number: String,
    /// Failure reason.
    pub failure_reason: Option<String>,
    /// Raw gateway payload.
    pub gateway_response: Option<serde_json::Value>,
    /// Completion time.
    pub paid_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = LedgerError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            booking_id: row.booking_id.map(Into::into),
            client_id: row.client_id.map(Into::into),
            consultant_id: row.consultant_id.map(Into::into),
            amount: row.amount,
            currency: row.currency,
            method: parse_column(&row.method)?,
            status: parse_column(&row.status)?,
            transaction_id: row.transaction_id,
            invoice_number: row.invoice_number,
            failure_reason: row.failure_reason,
            gateway_response: row.gateway_response,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row of the `earnings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EarningRow {
    /// Primary key.
    pub id: Uuid,
    /// Credited consultant.
    pub consultant_id: Uuid,
    /// Triggering payment (unique).
    pub payment_id: Uuid,
    /// Gross amount.
    pub amount: Decimal,
    /// Commission.
    pub platform_fee: Decimal,
    /// Net amount.
    pub net_amount: Decimal,
    /// Availability.
    pub status: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EarningRow> for Earning {
    type Error = LedgerError;

    fn try_from(row: EarningRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            consultant_id: row.consultant_id.into(),
            payment_id: row.payment_id.into(),
            amount: row.amount,
            platform_fee: row.platform_fee,
            net_amount: row.net_amount,
            status: parse_column(&row.status)?,
            created_at: row.created_at,
        })
    }
}

/// A row of the `withdrawals` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WithdrawalRow {
    /// Primary key.
    pub id: Uuid,
    /// Requesting consultant.
    pub consultant_id: Uuid,
    /// Requesting user.
    pub user_id: Uuid,
    /// Requested amount.
    pub amount: Decimal,
    /// Bank name.
    pub bank_name: Option<String>,
    /// Account number.
    pub account_number: Option<String>,
    /// IBAN.
    pub iban: Option<String>,
    /// Review status.
    pub status: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<WithdrawalRow> for Withdrawal {
    type Error = LedgerError;

    fn try_from(row: WithdrawalRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            consultant_id: row.consultant_id.into(),
            user_id: row.user_id.into(),
            amount: row.amount,
            bank: BankDetails {
                bank_name: row.bank_name,
                account_number: row.account_number,
                iban: row.iban,
            },
            status: parse_column(&row.status)?,
            created_at: row.created_at,
        })
    }
}

/// A row of the `consultants` table (ledger-relevant columns only).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConsultantRow {
    /// Primary key.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Display name.
    pub display_name: String,
    /// Accepting bookings.
    pub is_available: bool,
    /// Default session price.
    pub price_per_session: Decimal,
    /// Average rating.
    pub rating: Decimal,
    /// Rating count.
    pub total_ratings: i32,
    /// Cached net earnings.
    pub total_earnings: Decimal,
    /// Bank name.
    pub bank_name: Option<String>,
    /// Account number.
    pub bank_account: Option<String>,
    /// IBAN.
    pub iban: Option<String>,
}

impl From<ConsultantRow> for Consultant {
    fn from(row: ConsultantRow) -> Self {
        Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            display_name: row.display_name,
            is_available: row.is_available,
            price_per_session: row.price_per_session,
            rating: row.rating,
            total_ratings: row.total_ratings,
            total_earnings: row.total_earnings,
            bank: BankDetails {
                bank_name: row.bank_name,
                account_number: row.bank_account,
                iban: row.iban,
            },
        }
    }
}
