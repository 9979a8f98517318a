//! End-to-end HTTP flows over the in-memory store.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;

use consult_ledger::api::extract::{USER_ID_HEADER, USER_ROLE_HEADER};
use consult_ledger::app_state::AppState;
use consult_ledger::build_app;
use consult_ledger::config::LedgerConfig;
use consult_ledger::domain::{
    BankDetails, Booking, BookingId, Consultant, ConsultantId, Earning, Payment, PaymentId, Role,
    UserId, Withdrawal,
};
use consult_ledger::error::LedgerError;
use consult_ledger::notify::{MemoryNotifier, NotificationSink};
use consult_ledger::persistence::memory::MemoryStore;
use consult_ledger::persistence::{
    AggregateAudit, BookingFilter, GatewayUpsert, PaymentFilter, PaymentStatusUpdate,
    StatusChange, Store, WithdrawalOutcome,
};

/// Delegates to a [`MemoryStore`] but fails the next `record_earning` once
/// armed.
#[derive(Debug)]
struct FlakyEarnings {
    inner: Arc<MemoryStore>,
    fail_next: AtomicBool,
}

#[async_trait]
impl Store for FlakyEarnings {
    async fn get_consultant(&self, id: ConsultantId) -> Result<Option<Consultant>, LedgerError> {
        self.inner.get_consultant(id).await
    }

    async fn find_consultant_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Consultant>, LedgerError> {
        self.inner.find_consultant_by_user(user_id).await
    }

    async fn finance_recipients(&self) -> Result<Vec<UserId>, LedgerError> {
        self.inner.finance_recipients().await
    }

    async fn commission_rate_setting(&self) -> Result<Option<Decimal>, LedgerError> {
        self.inner.commission_rate_setting().await
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), LedgerError> {
        self.inner.insert_booking(booking).await
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, LedgerError> {
        self.inner.get_booking(id).await
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, LedgerError> {
        self.inner.list_bookings(filter).await
    }

    async fn transition_booking(
        &self,
        id: BookingId,
        change: &StatusChange,
    ) -> Result<Option<Booking>, LedgerError> {
        self.inner.transition_booking(id, change).await
    }

    async fn rate_booking(
        &self,
        id: BookingId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Option<Booking>, LedgerError> {
        self.inner.rate_booking(id, rating, comment).await
    }

    async fn delete_booking(&self, id: BookingId) -> Result<bool, LedgerError> {
        self.inner.delete_booking(id).await
    }

    async fn settle_booking(
        &self,
        id: BookingId,
        payment_id: PaymentId,
    ) -> Result<Option<Booking>, LedgerError> {
        self.inner.settle_booking(id, payment_id).await
    }

    async fn insert_payment_intent(&self, payment: &Payment) -> Result<(), LedgerError> {
        self.inner.insert_payment_intent(payment).await
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, LedgerError> {
        self.inner.get_payment(id).await
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, LedgerError> {
        self.inner.list_payments(filter).await
    }

    async fn upsert_gateway_payment(
        &self,
        candidate: &Payment,
    ) -> Result<GatewayUpsert, LedgerError> {
        self.inner.upsert_gateway_payment(candidate).await
    }

    async fn update_payment_status(
        &self,
        id: PaymentId,
        update: &PaymentStatusUpdate,
    ) -> Result<Payment, LedgerError> {
        self.inner.update_payment_status(id, update).await
    }

    async fn record_earning(&self, earning: &Earning) -> Result<bool, LedgerError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Persistence("connection reset".to_string()));
        }
        self.inner.record_earning(earning).await
    }

    async fn record_adjustment(
        &self,
        payment: &Payment,
        earning: &Earning,
    ) -> Result<(), LedgerError> {
        self.inner.record_adjustment(payment, earning).await
    }

    async fn available_balance(
        &self,
        consultant_id: ConsultantId,
    ) -> Result<Decimal, LedgerError> {
        self.inner.available_balance(consultant_id).await
    }

    async fn create_withdrawal(
        &self,
        withdrawal: &Withdrawal,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        self.inner.create_withdrawal(withdrawal).await
    }

    async fn list_earnings(
        &self,
        consultant_id: ConsultantId,
    ) -> Result<Vec<Earning>, LedgerError> {
        self.inner.list_earnings(consultant_id).await
    }

    async fn list_withdrawals(
        &self,
        consultant_id: ConsultantId,
    ) -> Result<Vec<Withdrawal>, LedgerError> {
        self.inner.list_withdrawals(consultant_id).await
    }

    async fn audit_consultant(
        &self,
        consultant_id: ConsultantId,
        repair: bool,
    ) -> Result<Option<AggregateAudit>, LedgerError> {
        self.inner.audit_consultant(consultant_id, repair).await
    }
}

struct TestApp {
    app: Router,
    consultant: Consultant,
    client: UserId,
    admin: UserId,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_store(Arc::clone(&store), store).await
    }

    async fn with_store(store: Arc<MemoryStore>, backend: Arc<dyn Store>) -> Self {
        let consultant = Consultant {
            id: ConsultantId::new(),
            user_id: UserId::new(),
            display_name: "Omar Haddad".to_string(),
            is_available: true,
            price_per_session: dec!(500),
            rating: Decimal::ZERO,
            total_ratings: 0,
            total_earnings: Decimal::ZERO,
            bank: BankDetails {
                bank_name: Some("SNB".to_string()),
                account_number: Some("10000001".to_string()),
                iban: Some("SA0310000000000010000001".to_string()),
            },
        };
        store.upsert_consultant(consultant.clone()).await;
        let client = UserId::new();
        let admin = UserId::new();
        store.register_user(client, Role::Client).await;
        store.register_user(admin, Role::Admin).await;

        let notifier: Arc<dyn NotificationSink> = Arc::new(MemoryNotifier::new());
        let state = AppState::new(backend, notifier, &LedgerConfig::default());
        Self {
            app: build_app(state),
            consultant,
            client,
            admin,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        caller: Option<(UserId, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((user_id, role)) = caller {
            builder = builder
                .header(USER_ID_HEADER, user_id.to_string())
                .header(USER_ROLE_HEADER, role);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let Ok(request) = builder.body(body) else {
            panic!("request build failed");
        };
        let Ok(response) = self.app.clone().oneshot(request).await else {
            panic!("router failed");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn book(&self) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/bookings",
                Some((self.client, "CLIENT")),
                Some(json!({
                    "consultant_id": self.consultant.id,
                    "service_id": uuid::Uuid::new_v4(),
                    "booking_type": "VIDEO_CALL",
                    "scheduled_at": "2026-11-02T10:00:00Z",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let Some(id) = body["id"].as_str() else {
            panic!("booking id missing: {body}");
        };
        id.to_string()
    }

    fn paid_webhook(&self, transaction_id: &str, booking_id: &str) -> Value {
        json!({
            "id": transaction_id,
            "status": "paid",
            "amount": 50000,
            "currency": "SAR",
            "source": {"type": "mada"},
            "metadata": {"bookingId": booking_id, "clientId": self.client.to_string()},
        })
    }
}

fn decimal(value: &Value) -> Decimal {
    let Some(raw) = value.as_str() else {
        panic!("expected a decimal string, got {value}");
    };
    let Ok(parsed) = Decimal::from_str(raw) else {
        panic!("not a decimal: {raw}");
    };
    parsed
}

#[tokio::test]
async fn webhook_settles_booking_and_credits_consultant_once() {
    let t = TestApp::new().await;
    let booking_id = t.book().await;
    let webhook = t.paid_webhook("pay_flow_1", &booking_id);

    let (status, ack) = t
        .send(Method::POST, "/api/v1/payments/webhook", None, Some(webhook.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{ack}");
    assert_eq!(ack["received"], json!(true));
    assert_eq!(ack["created"], json!(true));
    assert_eq!(ack["status"], json!("COMPLETED"));
    assert_eq!(ack["cascade"]["outcome"], json!("settled"));
    assert_eq!(ack["cascade"]["earning_recorded"], json!(true));

    let (status, replay) = t
        .send(Method::POST, "/api/v1/payments/webhook", None, Some(webhook))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["created"], json!(false));
    assert_eq!(replay["payment_id"], ack["payment_id"]);
    assert_eq!(replay["cascade"]["earning_recorded"], json!(false));

    let (status, booking) = t
        .send(
            Method::GET,
            &format!("/api/v1/bookings/{booking_id}"),
            Some((t.client, "CLIENT")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], json!("CONFIRMED"));
    assert_eq!(booking["payment_status"], json!("COMPLETED"));
    assert_eq!(booking["payment_id"], ack["payment_id"]);

    let consultant = (t.consultant.user_id, "CONSULTANT");
    let (status, summary) = t
        .send(Method::GET, "/api/v1/earnings", Some(consultant), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{summary}");
    assert_eq!(summary["earnings"].as_array().map(Vec::len), Some(1));
    assert_eq!(decimal(&summary["total_earnings"]), dec!(500));
    assert_eq!(decimal(&summary["available_balance"]), dec!(425));
    assert_eq!(decimal(&summary["earnings"][0]["platform_fee"]), dec!(75));
}

#[tokio::test]
async fn failed_cascade_is_acknowledged_and_retried_on_replay() {
    let memory = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyEarnings {
        inner: Arc::clone(&memory),
        fail_next: AtomicBool::new(false),
    });
    let t = TestApp::with_store(Arc::clone(&memory), Arc::clone(&flaky) as Arc<dyn Store>).await;
    let booking_id = t.book().await;
    let webhook = t.paid_webhook("pay_flaky", &booking_id);

    flaky.fail_next.store(true, Ordering::SeqCst);
    let (status, ack) = t
        .send(Method::POST, "/api/v1/payments/webhook", None, Some(webhook.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{ack}");
    assert_eq!(ack["status"], json!("COMPLETED"));
    assert_eq!(ack["cascade"]["outcome"], json!("failed"));

    let Ok(Some(consultant)) = memory.get_consultant(t.consultant.id).await else {
        panic!("consultant missing");
    };
    assert_eq!(consultant.total_earnings, Decimal::ZERO);

    let (status, replay) = t
        .send(Method::POST, "/api/v1/payments/webhook", None, Some(webhook.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{replay}");
    assert_eq!(replay["payment_id"], ack["payment_id"]);
    assert_eq!(replay["status"], json!("COMPLETED"));
    assert_eq!(replay["cascade"]["outcome"], json!("settled"));
    assert_eq!(replay["cascade"]["earning_recorded"], json!(true));

    let (_, again) = t
        .send(Method::POST, "/api/v1/payments/webhook", None, Some(webhook))
        .await;
    assert_eq!(again["cascade"]["earning_recorded"], json!(false));

    let Ok(Some(consultant)) = memory.get_consultant(t.consultant.id).await else {
        panic!("consultant missing");
    };
    assert_eq!(consultant.total_earnings, dec!(425.00));
    let Ok(earnings) = memory.list_earnings(t.consultant.id).await else {
        panic!("list failed");
    };
    assert_eq!(earnings.len(), 1);
}

#[tokio::test]
async fn webhook_with_non_positive_amount_is_rejected() {
    let t = TestApp::new().await;
    let booking_id = t.book().await;
    let mut webhook = t.paid_webhook("pay_negative", &booking_id);
    webhook["amount"] = json!(-50000);

    let (status, body) = t
        .send(Method::POST, "/api/v1/payments/webhook", None, Some(webhook))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!(1002));

    let (_, booking) = t
        .send(
            Method::GET,
            &format!("/api/v1/bookings/{booking_id}"),
            Some((t.client, "CLIENT")),
            None,
        )
        .await;
    assert_eq!(booking["status"], json!("PENDING"));
    assert_eq!(booking["payment_status"], json!("PENDING"));
}

#[tokio::test]
async fn withdrawal_is_bounded_by_available_balance() {
    let t = TestApp::new().await;
    let booking_id = t.book().await;
    let webhook = t.paid_webhook("pay_flow_2", &booking_id);
    let (status, _) = t
        .send(Method::POST, "/api/v1/payments/webhook", None, Some(webhook))
        .await;
    assert_eq!(status, StatusCode::OK);

    let consultant = Some((t.consultant.user_id, "CONSULTANT"));
    let (status, error) = t
        .send(
            Method::POST,
            "/api/v1/withdrawals",
            consultant,
            Some(json!({"amount": "500"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["error"]["code"], json!(4001));

    let (status, withdrawal) = t
        .send(
            Method::POST,
            "/api/v1/withdrawals",
            consultant,
            Some(json!({"amount": "400"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{withdrawal}");
    assert_eq!(withdrawal["status"], json!("PENDING"));
    assert_eq!(
        withdrawal["bank"]["iban"],
        json!("SA0310000000000010000001")
    );

    let (_, summary) = t
        .send(Method::GET, "/api/v1/earnings", consultant, None)
        .await;
    assert_eq!(decimal(&summary["available_balance"]), dec!(25));
}

#[tokio::test]
async fn admin_credit_shows_up_in_consultant_ledger() {
    let t = TestApp::new().await;
    let uri = format!("/api/v1/admin/consultants/{}/credit", t.consultant.id);
    let (status, adjustment) = t
        .send(
            Method::POST,
            &uri,
            Some((t.admin, "ADMIN")),
            Some(json!({"amount": "120.50", "notes": "goodwill"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{adjustment}");
    assert_eq!(adjustment["payment"]["status"], json!("COMPLETED"));
    assert_eq!(decimal(&adjustment["earning"]["platform_fee"]), Decimal::ZERO);

    let uri = format!("/api/v1/admin/consultants/{}/earnings", t.consultant.id);
    let (status, earnings) = t
        .send(Method::GET, &uri, Some((UserId::new(), "FINANCE")), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(earnings.as_array().map(Vec::len), Some(1));

    let uri = format!("/api/v1/admin/consultants/{}/credit", t.consultant.id);
    let (status, _) = t
        .send(
            Method::POST,
            &uri,
            Some((t.client, "CLIENT")),
            Some(json!({"amount": "10"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let t = TestApp::new().await;
    let (status, body) = t.send(Method::GET, "/api/v1/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!(1003));
}

#[tokio::test]
async fn malformed_webhooks_are_rejected() {
    let t = TestApp::new().await;
    let (status, _) = t
        .send(
            Method::POST,
            "/api/v1/payments/webhook",
            None,
            Some(json!({"status": "paid", "amount": 100})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let Ok(request) = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/payments/webhook")
        .body(Body::from("not json"))
    else {
        panic!("request build failed");
    };
    let Ok(response) = t.app.clone().oneshot(request).await else {
        panic!("router failed");
    };
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_is_public() {
    let t = TestApp::new().await;
    let (status, body) = t.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
}
