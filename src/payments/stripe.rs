//! Stripe checkout session creation

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::payments::checkout::CheckoutRequest;

/// Every checkout is charged in this currency
pub const CURRENCY: &str = "usd";

/// Stripe service for payment operations
#[derive(Clone)]
pub struct StripeService {
    client: Client,
    api_base: String,
    stripe_secret_key: String,
    public_base_url: String,
}

impl StripeService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_base: config.stripe_api_base.clone(),
            stripe_secret_key: config.stripe_secret_key.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Create a hosted checkout session for an ad-hoc item.
    ///
    /// Creates a product, a price for it and a session for that price, strictly
    /// in that order. A failure part way leaves the earlier records in Stripe.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSessionResponse, StripeError> {
        let product = self.create_product(request).await?;
        let price = self.create_price(&product.id, request.unit_amount).await?;

        let success_url = format!(
            "{}/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.public_base_url
        );
        let cancel_url = format!("{}/cancel", self.public_base_url);

        let form_data: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price]", price.id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("metadata[productId]", product.id.clone()),
            ("metadata[productTitle]", request.title.clone()),
            ("allow_promotion_codes", "true".to_string()),
            ("billing_address_collection", "required".to_string()),
            ("customer_creation", "always".to_string()),
        ];

        let session: StripeSession = self.post_form("/v1/checkout/sessions", &form_data).await?;
        let session_url = session.url.ok_or(StripeError::NoSessionUrl)?;

        info!(
            session_id = %session.id,
            product_id = %product.id,
            price_id = %price.id,
            unit_amount = request.unit_amount,
            "Created checkout session"
        );

        Ok(CheckoutSessionResponse {
            session_id: session.id,
            url: session_url,
        })
    }

    async fn create_product(&self, request: &CheckoutRequest) -> Result<StripeProduct, StripeError> {
        let form_data = [
            ("name", request.title.clone()),
            ("description", request.product_description().to_string()),
        ];

        let product: StripeProduct = self.post_form("/v1/products", &form_data).await?;
        debug!(product_id = %product.id, "Created Stripe product");
        Ok(product)
    }

    async fn create_price(&self, product_id: &str, unit_amount: i64) -> Result<StripePrice, StripeError> {
        let form_data = [
            ("product", product_id.to_string()),
            ("unit_amount", unit_amount.to_string()),
            ("currency", CURRENCY.to_string()),
        ];

        let price: StripePrice = self.post_form("/v1/prices", &form_data).await?;
        debug!(price_id = %price.id, product_id = %product_id, "Created Stripe price");
        Ok(price)
    }

    /// Make an authenticated form-encoded POST to the Stripe API
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form_data: &[(&str, String)],
    ) -> Result<T, StripeError> {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .basic_auth(&self.stripe_secret_key, None::<&str>)
            .form(form_data)
            .send()
            .await
            .map_err(StripeError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StripeError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        response.json().await.map_err(StripeError::Request)
    }
}

/// Pull `error.message` out of a Stripe error body, else return the body as-is
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<StripeErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeProduct {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
}

/// Stripe checkout session response
#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
}

/// Response from checkout session creation
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub url: String,
}

/// Stripe-related errors
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Stripe API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("No session URL returned")]
    NoSessionUrl,
}
