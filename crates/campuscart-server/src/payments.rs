//! Checkout-session client for priced listings.
//!
//! Only session creation lives here. The checkout pages and the success /
//! cancel redirects are served by the front-end.

use std::time::Duration;

use campuscart_shared::error::Result;
use campuscart_shared::MarketError;
use serde::Deserialize;

use crate::config::ServerConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
}

#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
    checkout_base: String,
    currency: String,
}

impl PaymentClient {
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_base: config.stripe_api_base.clone(),
            secret_key: config.stripe_secret_key.clone(),
            checkout_base: config.checkout_base_url.clone(),
            currency: config.payment_currency.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Open a one-item card checkout and return its session id.
    pub async fn create_payment_session(&self, amount_minor_units: i64, item_name: &str) -> Result<String> {
        if amount_minor_units <= 0 {
            return Err(MarketError::validation("amount must be positive"));
        }
        let item_name = item_name.trim();
        if item_name.is_empty() {
            return Err(MarketError::validation("item name is required"));
        }
        let Some(secret_key) = &self.secret_key else {
            return Err(MarketError::Backend("payments are not configured".into()));
        };

        let form = self.session_form(amount_minor_units, item_name);
        let url = format!("{}/v1/checkout/sessions", self.api_base);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| MarketError::Backend(format!("checkout request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "checkout session rejected");
            return Err(MarketError::Backend(format!(
                "checkout provider answered {status}"
            )));
        }

        let session: CheckoutSession = resp
            .json()
            .await
            .map_err(|e| MarketError::Backend(format!("invalid checkout response: {e}")))?;

        tracing::info!(session_id = %session.id, amount_minor_units, "checkout session created");
        Ok(session.id)
    }

    fn session_form(&self, amount_minor_units: i64, item_name: &str) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".into()),
            ("payment_method_types[0]", "card".into()),
            ("line_items[0][quantity]", "1".into()),
            ("line_items[0][price_data][currency]", self.currency.clone()),
            ("line_items[0][price_data][unit_amount]", amount_minor_units.to_string()),
            ("line_items[0][price_data][product_data][name]", item_name.to_string()),
            (
                "success_url",
                format!(
                    "{}/payment-success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.checkout_base
                ),
            ),
            ("cancel_url", format!("{}/payment-cancelled", self.checkout_base)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(secret: Option<&str>) -> PaymentClient {
        let config = ServerConfig {
            stripe_secret_key: secret.map(str::to_string),
            checkout_base_url: "https://cart.test".into(),
            ..ServerConfig::default()
        };
        PaymentClient::new(&config).unwrap()
    }

    #[test]
    fn form_describes_one_card_item() {
        let form = client(Some("sk_test")).session_form(2500, "Desk");
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("payment_method_types[0]"), Some("card"));
        assert_eq!(get("line_items[0][quantity]"), Some("1"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("2500"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(
            get("success_url"),
            Some("https://cart.test/payment-success?session_id={CHECKOUT_SESSION_ID}")
        );
        assert_eq!(get("cancel_url"), Some("https://cart.test/payment-cancelled"));
    }

    #[tokio::test]
    async fn invalid_input_rejected_before_network() {
        let payments = client(Some("sk_test"));
        assert!(matches!(
            payments.create_payment_session(0, "Desk").await,
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            payments.create_payment_session(100, "  ").await,
            Err(MarketError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_client_is_a_backend_error() {
        let payments = client(None);
        assert!(!payments.is_enabled());
        assert!(matches!(
            payments.create_payment_session(100, "Desk").await,
            Err(MarketError::Backend(_))
        ));
    }
}
