//! Payment records and gateway reconciliation rules.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;

use super::text_enum::text_enum;
use super::{BookingId, ConsultantId, PaymentId, UserId};
use crate::error::LedgerError;

text_enum! {
    /// Settlement status of a payment.
    pub enum PaymentStatus {
        /// Intent created, no gateway outcome yet.
        Pending => "PENDING",
        /// Money arrived. Reached at most once.
        Completed => "COMPLETED",
        /// Gateway declined the charge.
        Failed => "FAILED",
        /// Charge returned to the client. Immutable.
        Refunded => "REFUNDED",
    }
}

impl PaymentStatus {
    /// Maps a gateway status string onto a local status.
    #[must_use]
    pub fn from_gateway(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "paid" => Self::Completed,
            "failed" => Self::Failed,
            "refunded" => Self::Refunded,
            _ => Self::Pending,
        }
    }

    /// Returns `true` if `self → next` is allowed. Re-applying the current
    /// status is always allowed and is a no-op.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self as u8 == next as u8 {
            return true;
        }
        matches!(
            (self, next),
            (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Failed)
                | (Self::Pending, Self::Refunded)
                | (Self::Failed, Self::Pending)
                | (Self::Failed, Self::Completed)
                | (Self::Completed, Self::Refunded)
        )
    }
}

text_enum! {
    /// Payment instrument.
    pub enum PaymentMethod {
        /// Visa / Mastercard.
        CreditCard => "CREDIT_CARD",
        /// Saudi debit network.
        Mada => "MADA",
        /// Apple Pay wallet.
        ApplePay => "APPLE_PAY",
        /// STC Pay wallet.
        StcPay => "STC_PAY",
        /// Manual transfer, used for admin adjustments.
        BankTransfer => "BANK_TRANSFER",
    }
}

impl PaymentMethod {
    /// Maps a gateway `source.type` onto a method. Unknown sources are
    /// treated as card payments.
    #[must_use]
    pub fn from_gateway_source(source: &str) -> Self {
        match source.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "mada" => Self::Mada,
            "applepay" => Self::ApplePay,
            "stcpay" => Self::StcPay,
            _ => Self::CreditCard,
        }
    }
}

/// One monetary transaction, tied to at most one booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payment {
    /// Payment identifier.
    pub id: PaymentId,
    /// Linked booking, if any.
    pub booking_id: Option<BookingId>,
    /// Paying client.
    pub client_id: Option<UserId>,
    /// Consultant credited on settlement.
    pub consultant_id: Option<ConsultantId>,
    /// Amount in major units. Negative only for admin deductions.
    pub amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Payment instrument.
    pub method: PaymentMethod,
    /// Settlement status.
    pub status: PaymentStatus,
    /// Gateway transaction id (unique).
    pub transaction_id: Option<String>,
    /// Locally generated invoice number (unique).
    pub invoice_number: String,
    /// Reason supplied with a failed status.
    pub failure_reason: Option<String>,
    /// Raw gateway payload.
    pub gateway_response: Option<serde_json::Value>,
    /// Set when the payment completes.
    pub paid_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Returns `true` if this payment should credit a consultant.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    /// Merges a repeated gateway report into this stored row.
    ///
    /// Missing links are filled from the report and the latest gateway
    /// payload is kept. The status is only written when the transition is
    /// allowed; returns whether it was.
    pub fn merge_gateway_report(&mut self, report: &Self, at: DateTime<Utc>) -> bool {
        self.booking_id = self.booking_id.or(report.booking_id);
        self.client_id = self.client_id.or(report.client_id);
        self.consultant_id = self.consultant_id.or(report.consultant_id);
        if report.gateway_response.is_some() {
            self.gateway_response.clone_from(&report.gateway_response);
        }
        self.updated_at = at;
        if !self.status.can_transition_to(report.status) {
            return false;
        }
        self.set_status(report.status, at);
        true
    }

    /// Applies an admin status change.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidState`] when the stored status does not
    /// allow the transition (e.g. anything after `REFUNDED`).
    pub fn apply_manual_status(
        &mut self,
        status: PaymentStatus,
        transaction_id: Option<String>,
        failure_reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if !self.status.can_transition_to(status) {
            return Err(LedgerError::InvalidState(format!(
                "payment {} cannot move from {} to {}",
                self.id, self.status, status
            )));
        }
        if transaction_id.is_some() {
            self.transaction_id = transaction_id;
        }
        if failure_reason.is_some() {
            self.failure_reason = failure_reason;
        }
        self.set_status(status, at);
        Ok(())
    }

    fn set_status(&mut self, status: PaymentStatus, at: DateTime<Utc>) {
        if status == PaymentStatus::Completed && self.status != PaymentStatus::Completed {
            self.paid_at = Some(at);
        }
        self.status = status;
        self.updated_at = at;
    }
}

/// Converts a gateway amount in minor units (halalas) into SAR.
#[must_use]
pub fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

/// Nine random upper-case base36 characters.
#[must_use]
pub fn invoice_suffix() -> String {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut rng = rand::thread_rng();
    (0..9)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            ALPHABET.get(idx).copied().map_or('0', char::from)
        })
        .collect()
}

/// Generates an invoice number: `INV-<epochMillis>-<9 base36 chars>`.
#[must_use]
pub fn generate_invoice_number(now: DateTime<Utc>) -> String {
    format!("INV-{}-{}", now.timestamp_millis(), invoice_suffix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn gateway_status_mapping() {
        assert_eq!(PaymentStatus::from_gateway("paid"), PaymentStatus::Completed);
        assert_eq!(PaymentStatus::from_gateway("failed"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_gateway("refunded"), PaymentStatus::Refunded);
        assert_eq!(PaymentStatus::from_gateway("initiated"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_gateway("authorized"), PaymentStatus::Pending);
    }

    #[test]
    fn refunded_is_immutable() {
        for next in PaymentStatus::ALL {
            let allowed = PaymentStatus::Refunded.can_transition_to(*next);
            assert_eq!(allowed, *next == PaymentStatus::Refunded);
        }
    }

    #[test]
    fn completed_only_moves_to_refunded() {
        assert!(PaymentStatus::Completed.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Failed));
    }

    #[test]
    fn minor_units_convert_to_sar() {
        assert_eq!(from_minor_units(50_000), dec!(500.00));
        assert_eq!(from_minor_units(1), dec!(0.01));
    }

    #[test]
    fn source_type_mapping() {
        assert_eq!(PaymentMethod::from_gateway_source("mada"), PaymentMethod::Mada);
        assert_eq!(PaymentMethod::from_gateway_source("applepay"), PaymentMethod::ApplePay);
        assert_eq!(PaymentMethod::from_gateway_source("stc_pay"), PaymentMethod::StcPay);
        assert_eq!(PaymentMethod::from_gateway_source("creditcard"), PaymentMethod::CreditCard);
        assert_eq!(PaymentMethod::from_gateway_source("token"), PaymentMethod::CreditCard);
    }

    fn pending_payment() -> Payment {
        let now = Utc::now();
        Payment {
            id: PaymentId::new(),
            booking_id: None,
            client_id: None,
            consultant_id: None,
            amount: dec!(500),
            currency: "SAR".to_string(),
            method: PaymentMethod::CreditCard,
            status: PaymentStatus::Pending,
            transaction_id: Some("pay_1".to_string()),
            invoice_number: generate_invoice_number(now),
            failure_reason: None,
            gateway_response: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn merge_completes_and_stamps_paid_at_once() {
        let mut stored = pending_payment();
        let mut report = stored.clone();
        report.status = PaymentStatus::Completed;
        report.booking_id = Some(BookingId::new());

        let first = Utc::now();
        assert!(stored.merge_gateway_report(&report, first));
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.paid_at, Some(first));
        assert_eq!(stored.booking_id, report.booking_id);

        let later = first + chrono::Duration::seconds(5);
        assert!(stored.merge_gateway_report(&report, later));
        assert_eq!(stored.paid_at, Some(first));
    }

    #[test]
    fn merge_keeps_status_on_disallowed_transition() {
        let mut stored = pending_payment();
        stored.status = PaymentStatus::Completed;
        let mut report = stored.clone();
        report.status = PaymentStatus::Pending;

        assert!(!stored.merge_gateway_report(&report, Utc::now()));
        assert_eq!(stored.status, PaymentStatus::Completed);
    }

    #[test]
    fn manual_update_rejects_leaving_refunded() {
        let mut stored = pending_payment();
        stored.status = PaymentStatus::Refunded;
        let result =
            stored.apply_manual_status(PaymentStatus::Completed, None, None, Utc::now());
        assert!(matches!(result, Err(LedgerError::InvalidState(_))));
    }

    #[test]
    fn invoice_number_format() {
        let now = Utc::now();
        let invoice = generate_invoice_number(now);
        let parts: Vec<&str> = invoice.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.first().copied(), Some("INV"));
        assert_eq!(parts.get(1).copied(), Some(now.timestamp_millis().to_string().as_str()));
        let suffix = parts.get(2).copied().unwrap_or_default();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
