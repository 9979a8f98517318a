//! In-memory [`Store`] backend.
//!
//! All state lives behind one [`tokio::sync::Mutex`]; every trait method
//! takes the guard once, so each command is atomic with respect to every
//! other command, which is the same guarantee the Postgres backend gets
//! from its transactions.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{
    AggregateAudit, BookingFilter, GatewayUpsert, PaymentFilter, PaymentStatusUpdate,
    StatusChange, Store, WithdrawalOutcome,
};
use crate::domain::consultant::fold_rating;
use crate::domain::{
    Booking, BookingId, BookingPaymentStatus, BookingStatus, Consultant, ConsultantId, Earning,
    EarningStatus, Payment, PaymentId, Role, UserId, Withdrawal, WithdrawalStatus,
};
use crate::error::LedgerError;

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, Role>,
    consultants: HashMap<ConsultantId, Consultant>,
    bookings: HashMap<BookingId, Booking>,
    payments: HashMap<PaymentId, Payment>,
    payments_by_tx: HashMap<String, PaymentId>,
    earnings: HashMap<PaymentId, Earning>,
    withdrawals: Vec<Withdrawal>,
    commission_rate: Option<Decimal>,
}

impl MemoryState {
    fn insert_payment(&mut self, payment: &Payment) -> Result<(), LedgerError> {
        if self.payments.values().any(|p| p.invoice_number == payment.invoice_number) {
            return Err(LedgerError::Persistence(format!(
                "duplicate invoice number {}",
                payment.invoice_number
            )));
        }
        if let Some(tx) = &payment.transaction_id {
            if self.payments_by_tx.contains_key(tx) {
                return Err(LedgerError::Persistence(format!(
                    "duplicate transaction id {tx}"
                )));
            }
            self.payments_by_tx.insert(tx.clone(), payment.id);
        }
        self.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    fn available_balance(&self, consultant_id: ConsultantId) -> Decimal {
        let earned: Decimal = self
            .earnings
            .values()
            .filter(|e| e.consultant_id == consultant_id && e.status == EarningStatus::Available)
            .map(|e| e.net_amount)
            .sum();
        let reserved: Decimal = self
            .withdrawals
            .iter()
            .filter(|w| w.consultant_id == consultant_id && w.status == WithdrawalStatus::Pending)
            .map(|w| w.amount)
            .sum();
        earned - reserved
    }

    fn credit(&mut self, consultant_id: ConsultantId, delta: Decimal) -> Result<(), LedgerError> {
        let consultant = self
            .consultants
            .get_mut(&consultant_id)
            .ok_or_else(|| LedgerError::not_found("consultant", consultant_id))?;
        consultant.total_earnings += delta;
        Ok(())
    }
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user account and its role.
    pub async fn register_user(&self, user_id: UserId, role: Role) {
        self.state.lock().await.users.insert(user_id, role);
    }

    /// Inserts or replaces a consultant profile, registering its user as a
    /// consultant.
    pub async fn upsert_consultant(&self, consultant: Consultant) {
        let mut state = self.state.lock().await;
        state.users.insert(consultant.user_id, Role::Consultant);
        state.consultants.insert(consultant.id, consultant);
    }

    /// Stores or clears the `commissionRate` setting.
    pub async fn set_commission_rate(&self, rate: Option<Decimal>) {
        self.state.lock().await.commission_rate = rate;
    }

    /// Overwrites an earning's status, as the withdrawal approval flow does.
    pub async fn set_earning_status(&self, payment_id: PaymentId, status: EarningStatus) {
        if let Some(earning) = self.state.lock().await.earnings.get_mut(&payment_id) {
            earning.status = status;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_consultant(&self, id: ConsultantId) -> Result<Option<Consultant>, LedgerError> {
        Ok(self.state.lock().await.consultants.get(&id).cloned())
    }

    async fn find_consultant_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Consultant>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .consultants
            .values()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn finance_recipients(&self) -> Result<Vec<UserId>, LedgerError> {
        let state = self.state.lock().await;
        let mut ids: Vec<UserId> = state
            .users
            .iter()
            .filter(|(_, role)| role.receives_finance_alerts())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn commission_rate_setting(&self) -> Result<Option<Decimal>, LedgerError> {
        Ok(self.state.lock().await.commission_rate)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if !state.consultants.contains_key(&booking.consultant_id) {
            return Err(LedgerError::not_found("consultant", booking.consultant_id));
        }
        state.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, LedgerError> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, LedgerError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        Ok(rows)
    }

    async fn transition_booking(
        &self,
        id: BookingId,
        change: &StatusChange,
    ) -> Result<Option<Booking>, LedgerError> {
        let mut state = self.state.lock().await;
        let Some(booking) = state.bookings.get_mut(&id) else {
            return Ok(None);
        };
        if booking.status != change.expected {
            return Ok(None);
        }
        booking.status = change.next;
        if change.next == BookingStatus::Completed {
            booking.completed_at = Some(change.at);
        }
        if change.consultant_notes.is_some() {
            booking.consultant_notes.clone_from(&change.consultant_notes);
        }
        booking.updated_at = change.at;
        Ok(Some(booking.clone()))
    }

    async fn rate_booking(
        &self,
        id: BookingId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Option<Booking>, LedgerError> {
        let mut state = self.state.lock().await;
        let Some(booking) = state.bookings.get(&id) else {
            return Ok(None);
        };
        if booking.status != BookingStatus::Completed || booking.rating.is_some() {
            return Ok(None);
        }
        let consultant_id = booking.consultant_id;
        let consultant = state
            .consultants
            .get_mut(&consultant_id)
            .ok_or_else(|| LedgerError::not_found("consultant", consultant_id))?;
        let (average, count) = fold_rating(consultant.rating, consultant.total_ratings, rating);
        consultant.rating = average;
        consultant.total_ratings = count;

        let Some(booking) = state.bookings.get_mut(&id) else {
            return Ok(None);
        };
        booking.rating = Some(rating);
        booking.comment = comment;
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn delete_booking(&self, id: BookingId) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().await;
        if state.bookings.remove(&id).is_none() {
            return Ok(false);
        }
        for payment in state.payments.values_mut() {
            if payment.booking_id == Some(id) {
                payment.booking_id = None;
            }
        }
        Ok(true)
    }

    async fn settle_booking(
        &self,
        id: BookingId,
        payment_id: PaymentId,
    ) -> Result<Option<Booking>, LedgerError> {
        let mut state = self.state.lock().await;
        let Some(booking) = state.bookings.get_mut(&id) else {
            return Ok(None);
        };
        booking.payment_status = BookingPaymentStatus::Completed;
        booking.payment_id = booking.payment_id.or(Some(payment_id));
        if booking.status == BookingStatus::Pending {
            booking.status = BookingStatus::Confirmed;
        }
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn insert_payment_intent(&self, payment: &Payment) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        let booking_id = payment
            .booking_id
            .ok_or_else(|| LedgerError::InvalidRequest("payment intent needs a booking".into()))?;
        if !state.bookings.contains_key(&booking_id) {
            return Err(LedgerError::not_found("booking", booking_id));
        }
        state.insert_payment(payment)?;
        if let Some(booking) = state.bookings.get_mut(&booking_id) {
            booking.payment_id = Some(payment.id);
            booking.payment_status = BookingPaymentStatus::Pending;
            booking.updated_at = payment.created_at;
        }
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, LedgerError> {
        Ok(self.state.lock().await.payments.get(&id).cloned())
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, LedgerError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn upsert_gateway_payment(
        &self,
        candidate: &Payment,
    ) -> Result<GatewayUpsert, LedgerError> {
        let Some(tx) = candidate.transaction_id.as_deref() else {
            return Err(LedgerError::InvalidPayload("missing transaction id".into()));
        };
        let mut state = self.state.lock().await;
        let existing = state.payments_by_tx.get(tx).copied();
        if let Some(stored) = existing.and_then(|id| state.payments.get_mut(&id)) {
            let previous_status = stored.status;
            let status_applied = stored.merge_gateway_report(candidate, Utc::now());
            return Ok(GatewayUpsert {
                payment: stored.clone(),
                previous_status: Some(previous_status),
                status_applied,
            });
        }
        state.insert_payment(candidate)?;
        Ok(GatewayUpsert {
            payment: candidate.clone(),
            previous_status: None,
            status_applied: true,
        })
    }

    async fn update_payment_status(
        &self,
        id: PaymentId,
        update: &PaymentStatusUpdate,
    ) -> Result<Payment, LedgerError> {
        let mut state = self.state.lock().await;
        if let Some(tx) = &update.transaction_id
            && state.payments_by_tx.get(tx).is_some_and(|owner| *owner != id)
        {
            return Err(LedgerError::Persistence(format!(
                "duplicate transaction id {tx}"
            )));
        }
        let stored = state
            .payments
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("payment", id))?;
        let previous_tx = stored.transaction_id.clone();
        stored.apply_manual_status(
            update.status,
            update.transaction_id.clone(),
            update.failure_reason.clone(),
            update.at,
        )?;
        let updated = stored.clone();
        if updated.transaction_id != previous_tx {
            if let Some(old) = previous_tx {
                state.payments_by_tx.remove(&old);
            }
            if let Some(new) = &updated.transaction_id {
                state.payments_by_tx.insert(new.clone(), id);
            }
        }
        Ok(updated)
    }

    async fn record_earning(&self, earning: &Earning) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().await;
        if state.earnings.contains_key(&earning.payment_id) {
            return Ok(false);
        }
        state.credit(earning.consultant_id, earning.net_amount)?;
        state.earnings.insert(earning.payment_id, earning.clone());
        Ok(true)
    }

    async fn record_adjustment(
        &self,
        payment: &Payment,
        earning: &Earning,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if !state.consultants.contains_key(&earning.consultant_id) {
            return Err(LedgerError::not_found("consultant", earning.consultant_id));
        }
        state.insert_payment(payment)?;
        state.credit(earning.consultant_id, earning.net_amount)?;
        state.earnings.insert(earning.payment_id, earning.clone());
        Ok(())
    }

    async fn available_balance(
        &self,
        consultant_id: ConsultantId,
    ) -> Result<Decimal, LedgerError> {
        Ok(self.state.lock().await.available_balance(consultant_id))
    }

    async fn create_withdrawal(
        &self,
        withdrawal: &Withdrawal,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        let mut state = self.state.lock().await;
        if !state.consultants.contains_key(&withdrawal.consultant_id) {
            return Err(LedgerError::not_found("consultant", withdrawal.consultant_id));
        }
        let available = state.available_balance(withdrawal.consultant_id);
        if withdrawal.amount > available {
            return Ok(WithdrawalOutcome::Insufficient { available });
        }
        state.withdrawals.push(withdrawal.clone());
        Ok(WithdrawalOutcome::Created(withdrawal.clone()))
    }

    async fn list_earnings(
        &self,
        consultant_id: ConsultantId,
    ) -> Result<Vec<Earning>, LedgerError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Earning> = state
            .earnings
            .values()
            .filter(|e| e.consultant_id == consultant_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_withdrawals(
        &self,
        consultant_id: ConsultantId,
    ) -> Result<Vec<Withdrawal>, LedgerError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Withdrawal> = state
            .withdrawals
            .iter()
            .filter(|w| w.consultant_id == consultant_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn audit_consultant(
        &self,
        consultant_id: ConsultantId,
        repair: bool,
    ) -> Result<Option<AggregateAudit>, LedgerError> {
        let mut state = self.state.lock().await;
        let Some(consultant) = state.consultants.get(&consultant_id) else {
            return Ok(None);
        };
        let ledger_total: Decimal = state
            .earnings
            .values()
            .filter(|e| e.consultant_id == consultant_id)
            .map(|e| e.net_amount)
            .sum();
        let ratings: Vec<i64> = state
            .bookings
            .values()
            .filter(|b| b.consultant_id == consultant_id)
            .filter_map(|b| b.rating.map(i64::from))
            .collect();
        let rating_count = i64::try_from(ratings.len()).unwrap_or(i64::MAX);
        let mut audit = AggregateAudit::compare(
            consultant,
            ledger_total,
            ratings.iter().sum(),
            rating_count,
        );

        if repair && audit.has_drift() {
            if let Some(consultant) = state.consultants.get_mut(&consultant_id) {
                consultant.total_earnings = audit.ledger_total_earnings;
                consultant.rating = audit.recomputed_rating;
                consultant.total_ratings = audit.recomputed_total_ratings;
            }
            audit.repaired = true;
        }
        Ok(Some(audit))
    }
}
