//! Hosted checkout sessions
//!
//! [`CheckoutProvider`] is the seam between the `create-checkout` handler and
//! the payment provider. [`StripeCheckout`] talks to a Stripe-compatible
//! `/v1/checkout/sessions` endpoint; tests substitute their own provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const USER_AGENT: &str = concat!("bizval-fn/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Checkout provider errors
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Checkout is not configured on this server")]
    NotConfigured,

    #[error("Checkout provider unreachable: {0}")]
    Network(String),

    #[error("Checkout provider returned {0}: {1}")]
    Provider(u16, String),

    #[error("Unexpected checkout provider response: {0}")]
    Parse(String),
}

/// What the caller wants to buy and where to send them afterwards
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub user_id: Uuid,
    pub customer_email: String,
}

/// A created hosted checkout session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub session_id: String,
}

#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, BillingError>;
}

/// Stripe session object, only the fields we use
#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
}

/// Stripe-compatible checkout client
pub struct StripeCheckout {
    http_client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeCheckout {
    pub fn new(api_base: &str, secret_key: String) -> Result<Self, BillingError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| BillingError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.api_base)
    }
}

/// Form fields for a single-item subscription checkout
fn session_form(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "subscription".to_string()),
        ("line_items[0][price]", request.price_id.clone()),
        ("line_items[0][quantity]", "1".to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        ("client_reference_id", request.user_id.to_string()),
        ("customer_email", request.customer_email.clone()),
    ]
}

#[async_trait]
impl CheckoutProvider for StripeCheckout {
    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, BillingError> {
        tracing::debug!(price_id = %request.price_id, user_id = %request.user_id, "Creating checkout session");

        let response = self
            .http_client
            .post(self.sessions_url())
            .bearer_auth(&self.secret_key)
            .form(&session_form(request))
            .send()
            .await
            .map_err(|e| BillingError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BillingError::Provider(status.as_u16(), error_text));
        }

        let session: StripeSession = response
            .json()
            .await
            .map_err(|e| BillingError::Parse(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| BillingError::Parse("session has no url".to_string()))?;

        tracing::info!(session_id = %session.id, user_id = %request.user_id, "Checkout session created");

        Ok(CheckoutSession {
            checkout_url,
            session_id: session.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            price_id: "price_123".to_string(),
            success_url: "https://app.example/ok".to_string(),
            cancel_url: "https://app.example/cancel".to_string(),
            user_id: Uuid::nil(),
            customer_email: "owner@example.com".to_string(),
        }
    }

    #[test]
    fn test_sessions_url_strips_trailing_slash() {
        let client = StripeCheckout::new("https://api.stripe.com/", "sk_test".to_string()).unwrap();
        assert_eq!(client.sessions_url(), "https://api.stripe.com/v1/checkout/sessions");
    }

    #[test]
    fn test_session_form_fields() {
        let form = session_form(&request());
        let get = |key: &str| form.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str());

        assert_eq!(get("mode"), Some("subscription"));
        assert_eq!(get("line_items[0][price]"), Some("price_123"));
        assert_eq!(get("line_items[0][quantity]"), Some("1"));
        assert_eq!(get("client_reference_id"), Some(Uuid::nil().to_string().as_str()));
        assert_eq!(get("customer_email"), Some("owner@example.com"));
    }
}
