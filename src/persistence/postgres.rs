//! PostgreSQL implementation of the persistence layer.
//!
//! Every [`Store`] command runs in its own transaction. Idempotence comes
//! from unique constraints (`payments.transaction_id`,
//! `earnings.payment_id`) combined with `ON CONFLICT DO NOTHING`; races on
//! mutable rows are closed with `SELECT ... FOR UPDATE` or compare-and-set
//! `UPDATE ... WHERE status = $expected`.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::models::{
    BOOKING_COLUMNS, BookingRow, CONSULTANT_COLUMNS, ConsultantRow, EARNING_COLUMNS, EarningRow,
    PAYMENT_COLUMNS, PaymentRow, WITHDRAWAL_COLUMNS, WithdrawalRow,
};
use super::{
    AggregateAudit, BookingFilter, GatewayUpsert, PaymentFilter, PaymentStatusUpdate,
    StatusChange, Store, WithdrawalOutcome,
};
use crate::config::LedgerConfig;
use crate::domain::consultant::fold_rating;
use crate::domain::{
    Booking, BookingId, BookingPaymentStatus, BookingStatus, Consultant, ConsultantId, Earning,
    EarningStatus, Notification, Payment, PaymentId, Role, UserId, Withdrawal, WithdrawalStatus,
};
use crate::error::LedgerError;
use crate::notify::NotificationSink;

/// Key of the commission setting in `system_settings`.
const COMMISSION_RATE_KEY: &str = "commissionRate";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError::Persistence`] if the database is
    /// unreachable.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::Persistence(e.to_string()))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, LedgerError> {
        Ok(self.pool.begin().await?)
    }
}

async fn lock_payment(
    tx: &mut Transaction<'static, Postgres>,
    id: PaymentId,
) -> Result<Option<Payment>, LedgerError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
    ))
    .bind(Uuid::from(id))
    .fetch_optional(&mut **tx)
    .await?;
    row.map(Payment::try_from).transpose()
}

async fn lock_payment_by_transaction(
    tx: &mut Transaction<'static, Postgres>,
    transaction_id: &str,
) -> Result<Option<Payment>, LedgerError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1 FOR UPDATE"
    ))
    .bind(transaction_id)
    .fetch_optional(&mut **tx)
    .await?;
    row.map(Payment::try_from).transpose()
}

async fn write_payment(
    tx: &mut Transaction<'static, Postgres>,
    payment: &Payment,
) -> Result<(), LedgerError> {
    sqlx::query(
        "UPDATE payments SET booking_id = $2, client_id = $3, consultant_id = $4, status = $5, \
         transaction_id = $6, failure_reason = $7, gateway_response = $8, paid_at = $9, \
         updated_at = $10 WHERE id = $1",
    )
    .bind(Uuid::from(payment.id))
    .bind(payment.booking_id.map(Uuid::from))
    .bind(payment.client_id.map(Uuid::from))
    .bind(payment.consultant_id.map(Uuid::from))
    .bind(payment.status.as_str())
    .bind(payment.transaction_id.as_deref())
    .bind(payment.failure_reason.as_deref())
    .bind(payment.gateway_response.clone())
    .bind(payment.paid_at)
    .bind(payment.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_payment(
    tx: &mut Transaction<'static, Postgres>,
    payment: &Payment,
    on_conflict: &str,
) -> Result<Option<Payment>, LedgerError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "INSERT INTO payments ({PAYMENT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         {on_conflict} RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(Uuid::from(payment.id))
    .bind(payment.booking_id.map(Uuid::from))
    .bind(payment.client_id.map(Uuid::from))
    .bind(payment.consultant_id.map(Uuid::from))
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(payment.method.as_str())
    .bind(payment.status.as_str())
    .bind(payment.transaction_id.as_deref())
    .bind(&payment.invoice_number)
    .bind(payment.failure_reason.as_deref())
    .bind(payment.gateway_response.clone())
    .bind(payment.paid_at)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .fetch_optional(&mut **tx)
    .await?;
    row.map(Payment::try_from).transpose()
}

async fn insert_earning(
    tx: &mut Transaction<'static, Postgres>,
    earning: &Earning,
) -> Result<bool, LedgerError> {
    let inserted = sqlx::query(&format!(
        "INSERT INTO earnings ({EARNING_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (payment_id) DO NOTHING"
    ))
    .bind(Uuid::from(earning.id))
    .bind(Uuid::from(earning.consultant_id))
    .bind(Uuid::from(earning.payment_id))
    .bind(earning.amount)
    .bind(earning.platform_fee)
    .bind(earning.net_amount)
    .bind(earning.status.as_str())
    .bind(earning.created_at)
    .execute(&mut **tx)
    .await?
    .rows_affected();
    Ok(inserted == 1)
}

async fn credit_consultant(
    tx: &mut Transaction<'static, Postgres>,
    consultant_id: ConsultantId,
    delta: Decimal,
) -> Result<(), LedgerError> {
    let updated = sqlx::query(
        "UPDATE consultants SET total_earnings = total_earnings + $2 WHERE id = $1",
    )
    .bind(Uuid::from(consultant_id))
    .bind(delta)
    .execute(&mut **tx)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(LedgerError::not_found("consultant", consultant_id));
    }
    Ok(())
}

async fn lock_consultant(
    tx: &mut Transaction<'static, Postgres>,
    consultant_id: ConsultantId,
) -> Result<Option<Consultant>, LedgerError> {
    let row = sqlx::query_as::<_, ConsultantRow>(&format!(
        "SELECT {CONSULTANT_COLUMNS} FROM consultants WHERE id = $1 FOR UPDATE"
    ))
    .bind(Uuid::from(consultant_id))
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(Consultant::from))
}

async fn balance_in(
    tx: &mut Transaction<'static, Postgres>,
    consultant_id: ConsultantId,
) -> Result<Decimal, LedgerError> {
    let balance = sqlx::query_scalar::<_, Decimal>(
        "SELECT \
           COALESCE((SELECT SUM(net_amount) FROM earnings \
                     WHERE consultant_id = $1 AND status = $2), 0) \
         - COALESCE((SELECT SUM(amount) FROM withdrawals \
                     WHERE consultant_id = $1 AND status = $3), 0)",
    )
    .bind(Uuid::from(consultant_id))
    .bind(EarningStatus::Available.as_str())
    .bind(WithdrawalStatus::Pending.as_str())
    .fetch_one(&mut **tx)
    .await?;
    Ok(balance)
}

/// Reads a setting value stored either as a JSON number or a JSON string.
fn decimal_setting(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_consultant(&self, id: ConsultantId) -> Result<Option<Consultant>, LedgerError> {
        let row = sqlx::query_as::<_, ConsultantRow>(&format!(
            "SELECT {CONSULTANT_COLUMNS} FROM consultants WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Consultant::from))
    }

    async fn find_consultant_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Consultant>, LedgerError> {
        let row = sqlx::query_as::<_, ConsultantRow>(&format!(
            "SELECT {CONSULTANT_COLUMNS} FROM consultants WHERE user_id = $1"
        ))
        .bind(Uuid::from(user_id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Consultant::from))
    }

    async fn finance_recipients(&self) -> Result<Vec<UserId>, LedgerError> {
        let roles: Vec<&str> = [Role::Admin, Role::SuperAdmin, Role::Finance]
            .iter()
            .map(|r| r.as_str())
            .collect();
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM users WHERE role = ANY($1) ORDER BY id",
        )
        .bind(roles)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(UserId::from).collect())
    }

    async fn commission_rate_setting(&self) -> Result<Option<Decimal>, LedgerError> {
        let value = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT value FROM system_settings WHERE key = $1",
        )
        .bind(COMMISSION_RATE_KEY)
        .fetch_optional(&self.pool)
        .await?;
        let Some(value) = value else {
            return Ok(None);
        };
        let rate = decimal_setting(&value);
        if rate.is_none() {
            tracing::warn!(%value, "ignoring unreadable commissionRate setting");
        }
        Ok(rate)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), LedgerError> {
        sqlx::query(&format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        ))
        .bind(Uuid::from(booking.id))
        .bind(Uuid::from(booking.client_id))
        .bind(Uuid::from(booking.consultant_id))
        .bind(Uuid::from(booking.service_id))
        .bind(booking.booking_type.as_str())
        .bind(booking.scheduled_at)
        .bind(booking.duration_minutes)
        .bind(booking.price)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.payment_id.map(Uuid::from))
        .bind(booking.rating.map(i16::from))
        .bind(booking.comment.as_deref())
        .bind(booking.client_notes.as_deref())
        .bind(booking.consultant_notes.as_deref())
        .bind(booking.completed_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, LedgerError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, LedgerError> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE TRUE"));
        if let Some(client_id) = filter.client_id {
            query.push(" AND client_id = ").push_bind(Uuid::from(client_id));
        }
        if let Some(consultant_id) = filter.consultant_id {
            query
                .push(" AND consultant_id = ")
                .push_bind(Uuid::from(consultant_id));
        }
        if !filter.statuses.is_empty() {
            let statuses: Vec<&str> = filter.statuses.iter().map(|s| s.as_str()).collect();
            query.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        if let Some(booking_type) = filter.booking_type {
            query
                .push(" AND booking_type = ")
                .push_bind(booking_type.as_str());
        }
        query.push(" ORDER BY scheduled_at DESC");

        let rows = query
            .build_query_as::<BookingRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn transition_booking(
        &self,
        id: BookingId,
        change: &StatusChange,
    ) -> Result<Option<Booking>, LedgerError> {
        let completed_at = (change.next == BookingStatus::Completed).then_some(change.at);
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = $3, \
               completed_at = COALESCE($4, completed_at), \
               consultant_notes = COALESCE($5, consultant_notes), \
               updated_at = $6 \
             WHERE id = $1 AND status = $2 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(Uuid::from(id))
        .bind(change.expected.as_str())
        .bind(change.next.as_str())
        .bind(completed_at)
        .bind(change.consultant_notes.as_deref())
        .bind(change.at)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn rate_booking(
        &self,
        id: BookingId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Option<Booking>, LedgerError> {
        let mut tx = self.begin().await?;
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET rating = $2, comment = $3, updated_at = $4 \
             WHERE id = $1 AND status = $5 AND rating IS NULL RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(Uuid::from(id))
        .bind(i16::from(rating))
        .bind(comment.as_deref())
        .bind(Utc::now())
        .bind(BookingStatus::Completed.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(booking) = row.map(Booking::try_from).transpose()? else {
            return Ok(None);
        };

        let consultant = lock_consultant(&mut tx, booking.consultant_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("consultant", booking.consultant_id))?;
        let (average, count) = fold_rating(consultant.rating, consultant.total_ratings, rating);
        sqlx::query("UPDATE consultants SET rating = $2, total_ratings = $3 WHERE id = $1")
            .bind(Uuid::from(consultant.id))
            .bind(average)
            .bind(count)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(booking))
    }

    async fn delete_booking(&self, id: BookingId) -> Result<bool, LedgerError> {
        let deleted = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn settle_booking(
        &self,
        id: BookingId,
        payment_id: PaymentId,
    ) -> Result<Option<Booking>, LedgerError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET payment_status = $2, \
               payment_id = COALESCE(payment_id, $3), \
               status = CASE WHEN status = $4 THEN $5 ELSE status END, \
               updated_at = $6 \
             WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(Uuid::from(id))
        .bind(BookingPaymentStatus::Completed.as_str())
        .bind(Uuid::from(payment_id))
        .bind(BookingStatus::Pending.as_str())
        .bind(BookingStatus::Confirmed.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn insert_payment_intent(&self, payment: &Payment) -> Result<(), LedgerError> {
        let booking_id = payment
            .booking_id
            .ok_or_else(|| LedgerError::InvalidRequest("payment intent needs a booking".into()))?;
        let mut tx = self.begin().await?;
        insert_payment(&mut tx, payment, "").await?;
        let linked = sqlx::query(
            "UPDATE bookings SET payment_id = $2, payment_status = $3, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(Uuid::from(booking_id))
        .bind(Uuid::from(payment.id))
        .bind(BookingPaymentStatus::Pending.as_str())
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if linked == 0 {
            return Err(LedgerError::not_found("booking", booking_id));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, LedgerError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, LedgerError> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE TRUE"));
        if let Some(client_id) = filter.client_id {
            query.push(" AND client_id = ").push_bind(Uuid::from(client_id));
        }
        if let Some(consultant_id) = filter.consultant_id {
            query
                .push(" AND consultant_id = ")
                .push_bind(Uuid::from(consultant_id));
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query
            .build_query_as::<PaymentRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn upsert_gateway_payment(
        &self,
        candidate: &Payment,
    ) -> Result<GatewayUpsert, LedgerError> {
        let Some(transaction_id) = candidate.transaction_id.clone() else {
            return Err(LedgerError::InvalidPayload("missing transaction id".into()));
        };
        let mut tx = self.begin().await?;

        let mut stored = lock_payment_by_transaction(&mut tx, &transaction_id).await?;
        if stored.is_none() {
            let inserted =
                insert_payment(&mut tx, candidate, "ON CONFLICT (transaction_id) DO NOTHING")
                    .await?;
            if let Some(payment) = inserted {
                tx.commit().await?;
                return Ok(GatewayUpsert {
                    payment,
                    previous_status: None,
                    status_applied: true,
                });
            }
            // A concurrent delivery inserted the row first.
            stored = lock_payment_by_transaction(&mut tx, &transaction_id).await?;
        }
        let mut payment = stored.ok_or_else(|| {
            LedgerError::Persistence(format!("payment {transaction_id} vanished during upsert"))
        })?;

        let previous_status = payment.status;
        let status_applied = payment.merge_gateway_report(candidate, Utc::now());
        write_payment(&mut tx, &payment).await?;
        tx.commit().await?;
        Ok(GatewayUpsert {
            payment,
            previous_status: Some(previous_status),
            status_applied,
        })
    }

    async fn update_payment_status(
        &self,
        id: PaymentId,
        update: &PaymentStatusUpdate,
    ) -> Result<Payment, LedgerError> {
        let mut tx = self.begin().await?;
        let mut payment = lock_payment(&mut tx, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("payment", id))?;
        payment.apply_manual_status(
            update.status,
            update.transaction_id.clone(),
            update.failure_reason.clone(),
            update.at,
        )?;
        write_payment(&mut tx, &payment).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn record_earning(&self, earning: &Earning) -> Result<bool, LedgerError> {
        let mut tx = self.begin().await?;
        if !insert_earning(&mut tx, earning).await? {
            return Ok(false);
        }
        credit_consultant(&mut tx, earning.consultant_id, earning.net_amount).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn record_adjustment(
        &self,
        payment: &Payment,
        earning: &Earning,
    ) -> Result<(), LedgerError> {
        let mut tx = self.begin().await?;
        insert_payment(&mut tx, payment, "").await?;
        insert_earning(&mut tx, earning).await?;
        credit_consultant(&mut tx, earning.consultant_id, earning.net_amount).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn available_balance(
        &self,
        consultant_id: ConsultantId,
    ) -> Result<Decimal, LedgerError> {
        let mut tx = self.begin().await?;
        let balance = balance_in(&mut tx, consultant_id).await?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn create_withdrawal(
        &self,
        withdrawal: &Withdrawal,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        let mut tx = self.begin().await?;
        if lock_consultant(&mut tx, withdrawal.consultant_id)
            .await?
            .is_none()
        {
            return Err(LedgerError::not_found("consultant", withdrawal.consultant_id));
        }
        let available = balance_in(&mut tx, withdrawal.consultant_id).await?;
        if withdrawal.amount > available {
            return Ok(WithdrawalOutcome::Insufficient { available });
        }

        sqlx::query(&format!(
            "INSERT INTO withdrawals ({WITHDRAWAL_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(Uuid::from(withdrawal.id))
        .bind(Uuid::from(withdrawal.consultant_id))
        .bind(Uuid::from(withdrawal.user_id))
        .bind(withdrawal.amount)
        .bind(withdrawal.bank.bank_name.as_deref())
        .bind(withdrawal.bank.account_number.as_deref())
        .bind(withdrawal.bank.iban.as_deref())
        .bind(withdrawal.status.as_str())
        .bind(withdrawal.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(WithdrawalOutcome::Created(withdrawal.clone()))
    }

    async fn list_earnings(
        &self,
        consultant_id: ConsultantId,
    ) -> Result<Vec<Earning>, LedgerError> {
        let rows = sqlx::query_as::<_, EarningRow>(&format!(
            "SELECT {EARNING_COLUMNS} FROM earnings WHERE consultant_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(Uuid::from(consultant_id))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Earning::try_from).collect()
    }

    async fn list_withdrawals(
        &self,
        consultant_id: ConsultantId,
    ) -> Result<Vec<Withdrawal>, LedgerError> {
        let rows = sqlx::query_as::<_, WithdrawalRow>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE consultant_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(Uuid::from(consultant_id))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Withdrawal::try_from).collect()
    }

    async fn audit_consultant(
        &self,
        consultant_id: ConsultantId,
        repair: bool,
    ) -> Result<Option<AggregateAudit>, LedgerError> {
        let mut tx = self.begin().await?;
        let Some(consultant) = lock_consultant(&mut tx, consultant_id).await? else {
            return Ok(None);
        };
        let ledger_total = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(net_amount), 0) FROM earnings WHERE consultant_id = $1",
        )
        .bind(Uuid::from(consultant_id))
        .fetch_one(&mut *tx)
        .await?;
        let (rating_sum, rating_count) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COALESCE(SUM(rating), 0)::BIGINT, COUNT(rating) \
             FROM bookings WHERE consultant_id = $1",
        )
        .bind(Uuid::from(consultant_id))
        .fetch_one(&mut *tx)
        .await?;

        let mut audit = AggregateAudit::compare(&consultant, ledger_total, rating_sum, rating_count);
        if repair && audit.has_drift() {
            sqlx::query(
                "UPDATE consultants SET total_earnings = $2, rating = $3, total_ratings = $4 \
                 WHERE id = $1",
            )
            .bind(Uuid::from(consultant_id))
            .bind(audit.ledger_total_earnings)
            .bind(audit.recomputed_rating)
            .bind(audit.recomputed_total_ratings)
            .execute(&mut *tx)
            .await?;
            audit.repaired = true;
        }
        tx.commit().await?;
        Ok(Some(audit))
    }
}

/// Notification sink writing to the `notifications` table.
#[derive(Debug, Clone)]
pub struct PostgresNotifier {
    pool: PgPool,
}

impl PostgresNotifier {
    /// Creates a notifier sharing the store's pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PostgresNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, message, link, is_read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)",
        )
        .bind(Uuid::from(notification.id))
        .bind(Uuid::from(notification.user_id))
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.link)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
