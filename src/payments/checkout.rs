//! Checkout request parsing and validation

use serde_json::Value;

/// A validated purchase request for a single ad-hoc item
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    /// Price in integer cents
    pub unit_amount: i64,
    pub title: String,
    pub description: Option<String>,
}

impl CheckoutRequest {
    /// Parse and validate a raw `{price, title, description}` JSON body.
    ///
    /// `price` is in dollars and is rounded to whole cents.
    pub fn from_json(body: &[u8]) -> Result<Self, CheckoutRequestError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(CheckoutRequestError::EmptyBody);
        }

        let value: Value =
            serde_json::from_slice(body).map_err(|_| CheckoutRequestError::InvalidJson)?;

        let (price, title, description) = match &value {
            Value::Object(fields) => (
                fields.get("price"),
                fields.get("title"),
                fields.get("description"),
            ),
            _ => (None, None, None),
        };

        let price = present(price).ok_or(CheckoutRequestError::MissingFields)?;
        let title = present(title).ok_or(CheckoutRequestError::MissingFields)?;

        let unit_amount = price
            .as_f64()
            .and_then(dollars_to_cents)
            .ok_or(CheckoutRequestError::InvalidPrice)?;

        let title = title.as_str().ok_or(CheckoutRequestError::InvalidTitle)?;
        if title.trim().is_empty() {
            return Err(CheckoutRequestError::MissingFields);
        }

        let description = description
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(Self {
            unit_amount,
            title: title.trim().to_string(),
            description,
        })
    }

    /// Description sent to Stripe, the title stands in when none was given
    pub fn product_description(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.title)
    }
}

/// Treat null, zero and empty string as absent
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    })
}

/// Convert a dollar amount to cents, rejecting anything below one cent
fn dollars_to_cents(dollars: f64) -> Option<i64> {
    if !dollars.is_finite() {
        return None;
    }
    let cents = (dollars * 100.0).round();
    if cents < 1.0 || cents > i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}

/// Client input errors for the checkout endpoint
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutRequestError {
    #[error("Request body is required")]
    EmptyBody,

    #[error("Invalid JSON in request body")]
    InvalidJson,

    #[error("Price and title are required")]
    MissingFields,

    #[error("Price must be a positive amount")]
    InvalidPrice,

    #[error("Title must be a string")]
    InvalidTitle,
}
