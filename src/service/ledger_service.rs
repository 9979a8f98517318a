//! Earning and withdrawal ledger.
//!
//! Owns the platform-commission split, the consultant balance and the
//! admin adjustments. Every balance-affecting write goes through one
//! atomic [`Store`] command so the cached `total_earnings` on the
//! consultant always equals the sum of its earning rows.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::config::is_valid_commission_rate;
use crate::domain::earning::CommissionSplit;
use crate::domain::payment::invoice_suffix;
use crate::domain::{
    Actor, BankDetails, Consultant, ConsultantId, Earning, EarningStatus, Notification,
    NotificationKind, Payment, PaymentId, PaymentMethod, PaymentStatus, Role, Withdrawal,
};
use crate::error::LedgerError;
use crate::notify::{NotificationSink, deliver, deliver_all};
use crate::persistence::{AggregateAudit, Store, WithdrawalOutcome};

use super::require_admin;

/// A consultant's earnings view.
#[derive(Debug, Clone)]
pub struct EarningsSummary {
    /// Consultant the summary belongs to.
    pub consultant_id: ConsultantId,
    /// Earning rows, newest first.
    pub earnings: Vec<Earning>,
    /// Gross amount across all earnings, before commission.
    pub total_earnings: Decimal,
    /// Withdrawable now: available earnings minus pending withdrawals.
    pub available_balance: Decimal,
    /// Net amount of earnings not yet available.
    pub pending_earnings: Decimal,
}

/// The synthetic payment and earning written by an admin adjustment.
#[derive(Debug, Clone)]
pub struct Adjustment {
    /// Synthetic payment row.
    pub payment: Payment,
    /// Matching earning row.
    pub earning: Earning,
}

/// Ledger operations over consultant earnings.
#[derive(Debug, Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn NotificationSink>,
    default_commission: Decimal,
    currency: String,
}

impl LedgerService {
    /// Creates a ledger service.
    ///
    /// `default_commission` applies when no `commissionRate` setting is
    /// stored.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn NotificationSink>,
        default_commission: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            default_commission,
            currency: currency.into(),
        }
    }

    /// Currency code stamped on ledger payments.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Resolves the commission rate in force right now.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError::Persistence`] if the setting cannot be read.
    pub async fn commission_rate(&self) -> Result<Decimal, LedgerError> {
        match self.store.commission_rate_setting().await? {
            Some(rate) if is_valid_commission_rate(rate) => Ok(rate),
            Some(rate) => {
                tracing::warn!(%rate, "commissionRate setting out of range, using default");
                Ok(self.default_commission)
            }
            None => Ok(self.default_commission),
        }
    }

    /// Credits the consultant for a completed payment.
    ///
    /// Returns the new earning, or `None` when one already exists for the
    /// payment or the payment names no consultant.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidState`] if the payment is not
    /// completed, or a persistence error.
    pub async fn derive_earning(&self, payment: &Payment) -> Result<Option<Earning>, LedgerError> {
        if !payment.is_settled() {
            return Err(LedgerError::InvalidState(format!(
                "payment {} is {}, earnings need a completed payment",
                payment.id, payment.status
            )));
        }
        let Some(consultant_id) = payment.consultant_id else {
            tracing::warn!(payment_id = %payment.id, "completed payment names no consultant");
            return Ok(None);
        };

        let rate = self.commission_rate().await?;
        let split = CommissionSplit::compute(payment.amount, rate);
        let earning = Earning::available(consultant_id, payment.id, split);
        if !self.store.record_earning(&earning).await? {
            tracing::debug!(payment_id = %payment.id, "earning already recorded");
            return Ok(None);
        }
        tracing::info!(
            payment_id = %payment.id,
            consultant_id = %consultant_id,
            net_amount = %earning.net_amount,
            platform_fee = %earning.platform_fee,
            "earning recorded"
        );

        if let Some(consultant) = self.store.get_consultant(consultant_id).await? {
            let notification = Notification::new(
                consultant.user_id,
                NotificationKind::PaymentReceived,
                "Payment Received",
                format!(
                    "You earned {} {} from a completed session",
                    earning.net_amount, self.currency
                ),
                "/consultant/earnings",
            );
            deliver(self.notifier.as_ref(), notification).await;
        }
        Ok(Some(earning))
    }

    /// Files a payout request for the calling consultant.
    ///
    /// Bank fields left empty fall back to the consultant's profile.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] for non-consultants,
    /// [`LedgerError::InvalidRequest`] for a non-positive amount,
    /// [`LedgerError::NotFound`] without a consultant profile and
    /// [`LedgerError::InsufficientBalance`] when the amount exceeds the
    /// available balance.
    pub async fn request_withdrawal(
        &self,
        actor: &Actor,
        amount: Decimal,
        bank: Option<BankDetails>,
    ) -> Result<Withdrawal, LedgerError> {
        if actor.role != Role::Consultant {
            return Err(LedgerError::Forbidden);
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidRequest(
                "withdrawal amount must be positive".to_string(),
            ));
        }
        let consultant = self.consultant_of(actor).await?;
        let bank = bank.unwrap_or_default().or(&consultant.bank);
        let withdrawal = Withdrawal::pending(consultant.id, actor.user_id, amount, bank);

        let withdrawal = match self.store.create_withdrawal(&withdrawal).await? {
            WithdrawalOutcome::Created(withdrawal) => withdrawal,
            WithdrawalOutcome::Insufficient { available } => {
                tracing::info!(
                    consultant_id = %consultant.id,
                    %available,
                    requested = %amount,
                    "withdrawal refused"
                );
                return Err(LedgerError::InsufficientBalance {
                    available,
                    requested: amount,
                });
            }
        };
        tracing::info!(
            withdrawal_id = %withdrawal.id,
            consultant_id = %consultant.id,
            amount = %withdrawal.amount,
            "withdrawal requested"
        );

        let amount = withdrawal.amount.normalize();
        deliver(
            self.notifier.as_ref(),
            Notification::new(
                consultant.user_id,
                NotificationKind::WithdrawalRequested,
                "Withdrawal Requested",
                format!(
                    "Your withdrawal request of {amount} {} is pending review",
                    self.currency
                ),
                "/consultant/earnings",
            ),
        )
        .await;
        self.alert_finance(Notification::new(
            consultant.user_id,
            NotificationKind::WithdrawalRequested,
            "New Withdrawal Request",
            format!(
                "{} requested a withdrawal of {amount} {}",
                consultant.display_name, self.currency
            ),
            "/admin/withdrawals",
        ))
        .await;
        Ok(withdrawal)
    }

    /// Credits a consultant outside the booking flow.
    ///
    /// Writes a completed `BANK_TRANSFER` payment and a fee-free earning.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] for non-admins,
    /// [`LedgerError::InvalidRequest`] for a non-positive amount and
    /// [`LedgerError::NotFound`] for an unknown consultant.
    pub async fn manual_credit(
        &self,
        actor: &Actor,
        consultant_id: ConsultantId,
        amount: Decimal,
        notes: Option<String>,
    ) -> Result<Adjustment, LedgerError> {
        require_admin(actor)?;
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidRequest(
                "credit amount must be positive".to_string(),
            ));
        }
        let consultant = self.consultant(consultant_id).await?;
        let details = serde_json::json!({
            "source": "manual_credit",
            "adminId": actor.user_id,
            "notes": notes,
        });
        let adjustment = self
            .adjust(&consultant, amount, "MANUAL", details)
            .await?;
        tracing::info!(
            consultant_id = %consultant.id,
            admin_id = %actor.user_id,
            %amount,
            "manual credit applied"
        );

        let amount = amount.normalize();
        deliver(
            self.notifier.as_ref(),
            Notification::new(
                consultant.user_id,
                NotificationKind::PaymentReceived,
                "Profit Received",
                format!("You received {amount} {} from the platform", self.currency),
                "/consultant/earnings",
            ),
        )
        .await;
        self.alert_finance(Notification::new(
            actor.user_id,
            NotificationKind::AdminAlert,
            "Manual Credit",
            format!(
                "{amount} {} credited to {}",
                self.currency, consultant.display_name
            ),
            "/admin/consultants",
        ))
        .await;
        Ok(adjustment)
    }

    /// Debits a consultant outside the booking flow.
    ///
    /// Writes a negative payment and a matching negative earning so the
    /// cached total stays equal to the ledger sum.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] for non-admins,
    /// [`LedgerError::InvalidRequest`] for a non-positive amount and
    /// [`LedgerError::NotFound`] for an unknown consultant.
    pub async fn manual_deduction(
        &self,
        actor: &Actor,
        consultant_id: ConsultantId,
        amount: Decimal,
        reason: Option<String>,
    ) -> Result<Adjustment, LedgerError> {
        require_admin(actor)?;
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidRequest(
                "deduction amount must be positive".to_string(),
            ));
        }
        let consultant = self.consultant(consultant_id).await?;
        let details = serde_json::json!({
            "source": "manual_deduction",
            "adminId": actor.user_id,
            "reason": reason,
        });
        let adjustment = self
            .adjust(&consultant, -amount, "DEDUCT", details)
            .await?;
        tracing::info!(
            consultant_id = %consultant.id,
            admin_id = %actor.user_id,
            %amount,
            "manual deduction applied"
        );

        self.alert_finance(Notification::new(
            actor.user_id,
            NotificationKind::AdminAlert,
            "Manual Deduction",
            format!(
                "{} {} deducted from {}",
                amount.normalize(),
                self.currency,
                consultant.display_name
            ),
            "/admin/consultants",
        ))
        .await;
        Ok(adjustment)
    }

    /// Earnings view for the calling consultant.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] for non-consultants and
    /// [`LedgerError::NotFound`] without a consultant profile.
    pub async fn earnings_summary(&self, actor: &Actor) -> Result<EarningsSummary, LedgerError> {
        if actor.role != Role::Consultant {
            return Err(LedgerError::Forbidden);
        }
        let consultant = self.consultant_of(actor).await?;
        let earnings = self.store.list_earnings(consultant.id).await?;
        let available_balance = self.store.available_balance(consultant.id).await?;

        let total_earnings = earnings.iter().map(|e| e.amount).sum();
        let pending_earnings = earnings
            .iter()
            .filter(|e| e.status == EarningStatus::Pending)
            .map(|e| e.net_amount)
            .sum();
        Ok(EarningsSummary {
            consultant_id: consultant.id,
            earnings,
            total_earnings,
            available_balance,
            pending_earnings,
        })
    }

    /// All earnings of a consultant, for staff.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] for callers without finance
    /// access and [`LedgerError::NotFound`] for an unknown consultant.
    pub async fn consultant_earnings(
        &self,
        actor: &Actor,
        consultant_id: ConsultantId,
    ) -> Result<Vec<Earning>, LedgerError> {
        require_finance(actor)?;
        let consultant = self.consultant(consultant_id).await?;
        self.store.list_earnings(consultant.id).await
    }

    /// All withdrawals of a consultant, for staff.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] for callers without finance
    /// access and [`LedgerError::NotFound`] for an unknown consultant.
    pub async fn consultant_withdrawals(
        &self,
        actor: &Actor,
        consultant_id: ConsultantId,
    ) -> Result<Vec<Withdrawal>, LedgerError> {
        require_finance(actor)?;
        let consultant = self.consultant(consultant_id).await?;
        self.store.list_withdrawals(consultant.id).await
    }

    /// Recomputes a consultant's cached aggregates and optionally repairs
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Forbidden`] for non-admins and
    /// [`LedgerError::NotFound`] for an unknown consultant.
    pub async fn audit_consultant(
        &self,
        actor: &Actor,
        consultant_id: ConsultantId,
        repair: bool,
    ) -> Result<AggregateAudit, LedgerError> {
        require_admin(actor)?;
        let audit = self
            .store
            .audit_consultant(consultant_id, repair)
            .await?
            .ok_or_else(|| LedgerError::not_found("consultant", consultant_id))?;
        if audit.has_drift() {
            tracing::warn!(
                consultant_id = %consultant_id,
                cached = %audit.cached_total_earnings,
                ledger = %audit.ledger_total_earnings,
                repaired = audit.repaired,
                "consultant aggregates drifted"
            );
        }
        Ok(audit)
    }

    async fn consultant(&self, id: ConsultantId) -> Result<Consultant, LedgerError> {
        self.store
            .get_consultant(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("consultant", id))
    }

    async fn consultant_of(&self, actor: &Actor) -> Result<Consultant, LedgerError> {
        self.store
            .find_consultant_by_user(actor.user_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("consultant profile", actor.user_id))
    }

    async fn adjust(
        &self,
        consultant: &Consultant,
        amount: Decimal,
        prefix: &str,
        details: serde_json::Value,
    ) -> Result<Adjustment, LedgerError> {
        let now = Utc::now();
        let millis = now.timestamp_millis();
        let payment = Payment {
            id: PaymentId::new(),
            booking_id: None,
            client_id: None,
            consultant_id: Some(consultant.id),
            amount,
            currency: self.currency.clone(),
            method: PaymentMethod::BankTransfer,
            status: PaymentStatus::Completed,
            transaction_id: Some(format!("{prefix}-{millis}-{}", consultant.id)),
            invoice_number: format!("INV-{prefix}-{millis}-{}", invoice_suffix()),
            failure_reason: None,
            gateway_response: Some(details),
            paid_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        let earning = Earning::available(consultant.id, payment.id, CommissionSplit::fee_free(amount));
        self.store.record_adjustment(&payment, &earning).await?;
        Ok(Adjustment { payment, earning })
    }

    async fn alert_finance(&self, template: Notification) {
        match self.store.finance_recipients().await {
            Ok(recipients) => deliver_all(self.notifier.as_ref(), &recipients, &template).await,
            Err(error) => tracing::warn!(%error, "could not load finance recipients"),
        }
    }
}

fn require_finance(actor: &Actor) -> Result<(), LedgerError> {
    if actor.role.receives_finance_alerts() {
        Ok(())
    } else {
        Err(LedgerError::Forbidden)
    }
}
