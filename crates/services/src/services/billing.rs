//! Hosted-billing-provider client: checkout sessions, the customer portal,
//! and webhook event narrowing.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use ts_rs::TS;

#[derive(Debug, Clone, Error)]
pub enum BillingError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
    #[error("webhook rejected: {0}")]
    WebhookRejected(String),
}

impl BillingError {
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// A hosted checkout session the browser is redirected to.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub customer_id: Option<String>,
}

/// A hosted billing-portal session for managing existing sponsorships.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PortalSession {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutParams {
    /// Existing billing customer, when the sponsor has paid before.
    pub customer_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    /// Shown on the provider's checkout page.
    pub product_name: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Webhook payloads narrowed into the shapes we act on. Everything else is
/// acknowledged and ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    CheckoutCompleted {
        session_id: String,
        customer_id: Option<String>,
    },
    Ignored {
        event_type: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawWebhookEvent {
    #[serde(rename = "type")]
    event_type: Option<String>,
    data: Option<RawWebhookData>,
}

#[derive(Debug, Deserialize)]
struct RawWebhookData {
    object: Option<RawWebhookObject>,
}

#[derive(Debug, Deserialize)]
struct RawWebhookObject {
    id: Option<String>,
    customer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCheckoutSession {
    id: Option<String>,
    url: Option<String>,
    customer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPortalSession {
    url: Option<String>,
}

#[derive(Clone)]
pub struct BillingService {
    http: Client,
    base_url: String,
    secret_key: SecretString,
    webhook_secret: SecretString,
}

impl BillingService {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(
        base_url: String,
        secret_key: SecretString,
        webhook_secret: SecretString,
    ) -> Result<Self, BillingError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("lockedin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            secret_key,
            webhook_secret,
        })
    }

    /// Create a one-time-payment checkout session for a sponsorship.
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> Result<CheckoutSession, BillingError> {
        let mut form: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("success_url", params.success_url.clone()),
            ("cancel_url", params.cancel_url.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "line_items[0][price_data][currency]",
                params.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                params.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                params.product_name.clone(),
            ),
        ];
        if let Some(customer_id) = &params.customer_id {
            form.push(("customer", customer_id.clone()));
        }

        let raw: RawCheckoutSession = self
            .post_form("/v1/checkout/sessions", &form)
            .await?;

        match (raw.id, raw.url) {
            (Some(id), Some(url)) => Ok(CheckoutSession {
                id,
                url,
                customer_id: raw.customer,
            }),
            _ => Err(BillingError::Serde(
                "checkout session response missing id or url".to_string(),
            )),
        }
    }

    /// Create a billing-portal session for an existing customer.
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, BillingError> {
        let form = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];

        let raw: RawPortalSession = self.post_form("/v1/billing_portal/sessions", &form).await?;

        raw.url
            .map(|url| PortalSession { url })
            .ok_or_else(|| BillingError::Serde("portal session response missing url".to_string()))
    }

    /// Gate a webhook delivery on the shared secret header. The payload is
    /// still narrowed as untrusted input afterwards.
    pub fn verify_webhook_secret(&self, header: Option<&str>) -> Result<(), BillingError> {
        let expected = self.webhook_secret.expose_secret();
        if expected.is_empty() {
            return Err(BillingError::WebhookRejected(
                "webhook secret not configured".to_string(),
            ));
        }
        match header {
            Some(provided) if provided == expected => Ok(()),
            Some(_) => Err(BillingError::WebhookRejected(
                "secret mismatch".to_string(),
            )),
            None => Err(BillingError::WebhookRejected(
                "missing secret header".to_string(),
            )),
        }
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, BillingError> {
        let url = format!("{}{}", self.base_url, path);
        (|| async { self.send_request(&url, form).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_delay(Duration::from_secs(10))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &BillingError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "billing request failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?
            .json::<T>()
            .await
            .map_err(|e| BillingError::Serde(e.to_string()))
    }

    async fn send_request(
        &self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<reqwest::Response, BillingError> {
        let res = self
            .http
            .post(url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => Ok(res),
            StatusCode::UNAUTHORIZED => Err(BillingError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(BillingError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(BillingError::Http { status, body })
            }
        }
    }
}

/// Narrow a raw webhook payload into a [`BillingEvent`]. Unknown event types
/// are not an error; a checkout-completed event missing its session id is.
pub fn parse_webhook_event(payload: &[u8]) -> Result<BillingEvent, BillingError> {
    let raw: RawWebhookEvent =
        serde_json::from_slice(payload).map_err(|e| BillingError::Serde(e.to_string()))?;

    let event_type = raw.event_type.unwrap_or_default();
    if event_type != "checkout.session.completed" {
        return Ok(BillingEvent::Ignored { event_type });
    }

    let object = raw
        .data
        .and_then(|data| data.object)
        .ok_or_else(|| BillingError::Serde("event missing data.object".to_string()))?;
    let session_id = object
        .id
        .ok_or_else(|| BillingError::Serde("checkout event missing session id".to_string()))?;

    Ok(BillingEvent::CheckoutCompleted {
        session_id,
        customer_id: object.customer,
    })
}

fn map_reqwest_error(e: reqwest::Error) -> BillingError {
    if e.is_timeout() {
        BillingError::Timeout
    } else {
        BillingError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(webhook_secret: &str) -> BillingService {
        BillingService::new(
            "https://api.stripe.com".to_string(),
            SecretString::from("sk_test_123".to_string()),
            SecretString::from(webhook_secret.to_string()),
        )
        .unwrap()
    }

    #[test]
    fn checkout_completed_event_is_narrowed() {
        let payload = br#"{
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_123", "customer": "cus_9"}}
        }"#;
        assert_eq!(
            parse_webhook_event(payload).unwrap(),
            BillingEvent::CheckoutCompleted {
                session_id: "cs_123".to_string(),
                customer_id: Some("cus_9".to_string()),
            }
        );
    }

    #[test]
    fn unknown_event_types_are_ignored_not_errors() {
        let payload = br#"{"type": "invoice.paid", "data": {"object": {"id": "in_1"}}}"#;
        assert_eq!(
            parse_webhook_event(payload).unwrap(),
            BillingEvent::Ignored {
                event_type: "invoice.paid".to_string()
            }
        );

        let payload = br#"{"data": {}}"#;
        assert!(matches!(
            parse_webhook_event(payload).unwrap(),
            BillingEvent::Ignored { .. }
        ));
    }

    #[test]
    fn malformed_payloads_error() {
        assert!(matches!(
            parse_webhook_event(b"not json"),
            Err(BillingError::Serde(_))
        ));
        // Right type but missing the session id.
        let payload = br#"{"type": "checkout.session.completed", "data": {"object": {}}}"#;
        assert!(matches!(
            parse_webhook_event(payload),
            Err(BillingError::Serde(_))
        ));
    }

    #[test]
    fn webhook_secret_gate() {
        let service = service("whsec_abc");
        assert!(service.verify_webhook_secret(Some("whsec_abc")).is_ok());
        assert!(service.verify_webhook_secret(Some("wrong")).is_err());
        assert!(service.verify_webhook_secret(None).is_err());

        // An unconfigured secret rejects everything rather than passing
        // everything.
        let unconfigured = service_with_empty_secret();
        assert!(unconfigured.verify_webhook_secret(Some("")).is_err());
    }

    fn service_with_empty_secret() -> BillingService {
        service("")
    }
}
