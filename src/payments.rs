//! Payment gateway boundary.
//!
//! The gateway is a trait object injected through `AppState` so services can
//! be exercised against `MockGateway` while the binary wires up the
//! Stripe-backed implementation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub amount_in_cents: i64,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_status: String,
    pub payment_intent_id: Option<String>,
    pub amount_total_in_cents: i64,
    /// Carried through gateway metadata so a session can be resolved back
    /// to the purchase it pays for.
    pub user_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AppResult<CheckoutSession>;

    async fn retrieve_session(&self, session_id: &str) -> AppResult<CheckoutSession>;

    /// Issue a full refund for the payment intent behind a session.
    async fn create_refund(&self, payment_intent_id: &str) -> AppResult<()>;
}

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe over plain HTTPS with form-encoded bodies.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
    payment_intent: Option<String>,
    amount_total: Option<i64>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            success_url: "http://localhost:3000/purchases?session_id={CHECKOUT_SESSION_ID}".into(),
            cancel_url: "http://localhost:3000/products".into(),
        }
    }

    fn session_from(&self, session: StripeSession) -> CheckoutSession {
        let metadata_uuid = |key: &str| {
            session
                .metadata
                .get(key)
                .and_then(|value| Uuid::parse_str(value).ok())
        };
        CheckoutSession {
            user_id: metadata_uuid("user_id"),
            product_id: metadata_uuid("product_id"),
            id: session.id,
            url: session.url,
            payment_status: session.payment_status.unwrap_or_else(|| "unpaid".into()),
            payment_intent_id: session.payment_intent,
            amount_total_in_cents: session.amount_total.unwrap_or(0),
        }
    }

    async fn parse_session(&self, response: reqwest::Response) -> AppResult<CheckoutSession> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Payment(format!("stripe returned {status}: {body}")));
        }
        let session: StripeSession = response
            .json()
            .await
            .map_err(|err| AppError::Payment(err.to_string()))?;
        Ok(self.session_from(session))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AppResult<CheckoutSession> {
        let amount = request.amount_in_cents.to_string();
        let user_id = request.user_id.to_string();
        let product_id = request.product_id.to_string();
        let params: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("success_url", &self.success_url),
            ("cancel_url", &self.cancel_url),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", "usd"),
            ("line_items[0][price_data][unit_amount]", &amount),
            (
                "line_items[0][price_data][product_data][name]",
                &request.product_name,
            ),
            ("metadata[user_id]", &user_id),
            ("metadata[product_id]", &product_id),
        ];

        let response = self
            .client
            .post(format!("{STRIPE_API_BASE}/checkout/sessions"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .map_err(|err| AppError::Payment(err.to_string()))?;

        self.parse_session(response).await
    }

    async fn retrieve_session(&self, session_id: &str) -> AppResult<CheckoutSession> {
        let response = self
            .client
            .get(format!("{STRIPE_API_BASE}/checkout/sessions/{session_id}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|err| AppError::Payment(err.to_string()))?;

        self.parse_session(response).await
    }

    async fn create_refund(&self, payment_intent_id: &str) -> AppResult<()> {
        let response = self
            .client
            .post(format!("{STRIPE_API_BASE}/refunds"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[("payment_intent", payment_intent_id)])
            .send()
            .await
            .map_err(|err| AppError::Payment(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Payment(format!("stripe returned {status}: {body}")));
        }
        Ok(())
    }
}

/// In-memory gateway: every created session is immediately paid. Used by the
/// seed binary and the integration tests.
#[derive(Default)]
pub struct MockGateway {
    sessions: Mutex<HashMap<String, CheckoutSession>>,
    refunds: Mutex<Vec<String>>,
    counter: AtomicU64,
    fail_refunds: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create_refund` call fail.
    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    pub fn refunded_payment_intents(&self) -> Vec<String> {
        self.refunds.lock().expect("mock lock").clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AppResult<CheckoutSession> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let session = CheckoutSession {
            id: format!("cs_mock_{n}"),
            url: Some(format!("https://checkout.example/cs_mock_{n}")),
            payment_status: "paid".into(),
            payment_intent_id: Some(format!("pi_mock_{n}")),
            amount_total_in_cents: request.amount_in_cents,
            user_id: Some(request.user_id),
            product_id: Some(request.product_id),
        };
        self.sessions
            .lock()
            .expect("mock lock")
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn retrieve_session(&self, session_id: &str) -> AppResult<CheckoutSession> {
        self.sessions
            .lock()
            .expect("mock lock")
            .get(session_id)
            .cloned()
            .ok_or_else(|| AppError::Payment(format!("unknown session {session_id}")))
    }

    async fn create_refund(&self, payment_intent_id: &str) -> AppResult<()> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(AppError::Payment("refund rejected".into()));
        }
        self.refunds
            .lock()
            .expect("mock lock")
            .push(payment_intent_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_session_round_trip() {
        let gateway = MockGateway::new();
        let session = gateway
            .create_checkout_session(CheckoutSessionRequest {
                user_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                product_name: "Course Bundle".into(),
                amount_in_cents: 4900,
            })
            .await
            .unwrap();

        assert!(session.is_paid());
        let fetched = gateway.retrieve_session(&session.id).await.unwrap();
        assert_eq!(fetched.amount_total_in_cents, 4900);
        assert!(fetched.payment_intent_id.is_some());
    }

    #[tokio::test]
    async fn mock_refund_can_be_forced_to_fail() {
        let gateway = MockGateway::new();
        gateway.create_refund("pi_1").await.unwrap();
        assert_eq!(gateway.refunded_payment_intents(), vec!["pi_1".to_string()]);

        gateway.set_fail_refunds(true);
        assert!(gateway.create_refund("pi_2").await.is_err());
        assert_eq!(gateway.refunded_payment_intents(), vec!["pi_1".to_string()]);
    }
}
