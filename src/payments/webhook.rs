//! Stripe webhook handler with signature verification

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, warn};

use crate::app::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Handle Stripe webhook events
pub async fn stripe_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookError> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or(WebhookError::SecretNotConfigured)?;

    // Get the Stripe-Signature header
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    let event = construct_event(
        &body,
        signature,
        secret,
        state.config.webhook_tolerance_secs,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| {
        warn!(error = %e, "Rejected Stripe webhook");
        e
    })?;

    dispatch(&event);

    Ok(Json(json!({ "received": true })))
}

/// Verify the raw payload against its signature header and parse the event.
///
/// The payload must be the exact bytes received.
pub fn construct_event(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<StripeEvent, WebhookError> {
    let header = SignatureHeader::parse(signature_header)?;
    verify_signature(payload, &header, secret)?;

    if tolerance_secs > 0 && now.saturating_sub(header.timestamp) > tolerance_secs {
        return Err(WebhookError::TimestampOutsideTolerance);
    }

    serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
}

/// Parsed `Stripe-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    /// Parse `t=<unix>,v1=<hex>[,v1=<hex>...]`, other schemes are ignored
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut signatures: Vec<String> = Vec::new();

        for part in header.split(',') {
            let mut kv = part.splitn(2, '=');
            if let (Some(key), Some(value)) = (kv.next(), kv.next()) {
                match key {
                    "t" => timestamp = value.parse().ok(),
                    "v1" => signatures.push(value.to_string()),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::MalformedSignatureHeader)?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedSignatureHeader);
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Check that any `v1` signature is the HMAC-SHA256 of `"{t}." + payload`
fn verify_signature(
    payload: &[u8],
    header: &SignatureHeader,
    secret: &str,
) -> Result<(), WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::SignatureMismatch)?;
    mac.update(header.timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let valid = header.signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|provided| mac.clone().verify_slice(&provided).is_ok())
            .unwrap_or(false)
    });

    if valid {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// Event kinds this service reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    CheckoutSessionCompleted,
    PaymentIntentSucceeded,
    Unhandled(String),
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => EventKind::CheckoutSessionCompleted,
            "payment_intent.succeeded" => EventKind::PaymentIntentSucceeded,
            other => EventKind::Unhandled(other.to_string()),
        }
    }
}

/// Route a verified event to its handler.
///
/// Handlers only log. There is no dedup, so a redelivered event logs again.
pub fn dispatch(event: &StripeEvent) -> EventKind {
    let kind = EventKind::from_type(&event.event_type);
    let object_id = event.object_id().unwrap_or("unknown");

    match &kind {
        EventKind::CheckoutSessionCompleted => {
            info!(
                event_id = %event.id,
                session_id = %object_id,
                payment_status = event.object_str("payment_status").unwrap_or("unknown"),
                amount_total = ?event.data.object.get("amount_total").and_then(|v| v.as_i64()),
                "Checkout session completed"
            );
        }
        EventKind::PaymentIntentSucceeded => {
            info!(
                event_id = %event.id,
                payment_intent_id = %object_id,
                amount = ?event.data.object.get("amount").and_then(|v| v.as_i64()),
                "Payment intent succeeded"
            );
        }
        EventKind::Unhandled(event_type) => {
            info!(event_id = %event.id, event_type = %event_type, "Unhandled event type");
        }
    }

    kind
}

// ============================================================================
// Stripe Event Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

impl StripeEvent {
    fn object_str(&self, field: &str) -> Option<&str> {
        self.data.object.get(field).and_then(Value::as_str)
    }

    fn object_id(&self) -> Option<&str> {
        self.object_str("id")
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Webhook secret is not configured")]
    SecretNotConfigured,

    #[error("No stripe-signature header value was provided.")]
    MissingSignature,

    #[error("Unable to extract timestamp and signatures from header")]
    MalformedSignatureHeader,

    #[error("No signatures found matching the expected signature for payload")]
    SignatureMismatch,

    #[error("Timestamp outside the tolerance zone")]
    TimestampOutsideTolerance,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            WebhookError::SecretNotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    pub(crate) fn sign(secret: &str, timestamp: i64, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    fn completed_event() -> String {
        json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_test_1", "payment_status": "paid", "amount_total": 1000}}
        })
        .to_string()
    }

    #[test]
    fn parses_signature_header() {
        let header = SignatureHeader::parse("t=1700000000,v1=abc,v0=old,v1=def").unwrap();
        assert_eq!(header.timestamp, 1_700_000_000);
        assert_eq!(header.signatures, vec!["abc".to_string(), "def".to_string()]);
    }

    #[test]
    fn header_without_timestamp_or_v1_is_malformed() {
        assert!(matches!(
            SignatureHeader::parse("v1=abc"),
            Err(WebhookError::MalformedSignatureHeader)
        ));
        assert!(matches!(
            SignatureHeader::parse("t=1700000000,v0=abc"),
            Err(WebhookError::MalformedSignatureHeader)
        ));
        assert!(matches!(
            SignatureHeader::parse("garbage"),
            Err(WebhookError::MalformedSignatureHeader)
        ));
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = completed_event();
        let now = 1_700_000_000;
        let header = sign(SECRET, now, &payload);

        let event = construct_event(payload.as_bytes(), &header, SECRET, 300, now).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, "checkout.session.completed");
    }

    #[test]
    fn accepts_when_any_v1_matches() {
        let payload = completed_event();
        let now = 1_700_000_000;
        let valid = sign(SECRET, now, &payload);
        let header = format!("{},v1={}", valid, "00".repeat(32));

        assert!(construct_event(payload.as_bytes(), &header, SECRET, 300, now).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let payload = completed_event();
        let now = 1_700_000_000;
        let header = sign(SECRET, now, &payload);
        let tampered = payload.replace("1000", "1");

        let err = construct_event(tampered.as_bytes(), &header, SECRET, 300, now).unwrap_err();
        assert!(matches!(err, WebhookError::SignatureMismatch));
    }

    #[test]
    fn rejects_reserialized_payload() {
        let payload = format!("{}\n", completed_event());
        let now = 1_700_000_000;
        let header = sign(SECRET, now, &payload);
        let reserialized = serde_json::to_string(&serde_json::from_str::<Value>(&payload).unwrap()).unwrap();

        assert!(construct_event(reserialized.as_bytes(), &header, SECRET, 300, now).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = completed_event();
        let now = 1_700_000_000;
        let header = sign("whsec_other", now, &payload);

        let err = construct_event(payload.as_bytes(), &header, SECRET, 300, now).unwrap_err();
        assert!(matches!(err, WebhookError::SignatureMismatch));
    }

    #[test]
    fn rejects_non_hex_signature() {
        let payload = completed_event();
        let header = "t=1700000000,v1=not-hex";

        let err = construct_event(payload.as_bytes(), header, SECRET, 300, 1_700_000_000).unwrap_err();
        assert!(matches!(err, WebhookError::SignatureMismatch));
    }

    #[test]
    fn enforces_timestamp_tolerance() {
        let payload = completed_event();
        let signed_at = 1_700_000_000;
        let header = sign(SECRET, signed_at, &payload);

        let err = construct_event(payload.as_bytes(), &header, SECRET, 300, signed_at + 301)
            .unwrap_err();
        assert!(matches!(err, WebhookError::TimestampOutsideTolerance));

        assert!(construct_event(payload.as_bytes(), &header, SECRET, 300, signed_at + 300).is_ok());
        assert!(construct_event(payload.as_bytes(), &header, SECRET, 0, signed_at + 86_400).is_ok());
    }

    #[test]
    fn extreme_timestamp_is_outside_tolerance() {
        let payload = completed_event();
        let header = sign(SECRET, i64::MIN, &payload);
        assert!(header.starts_with("t=-9223372036854775808,"));

        let err = construct_event(payload.as_bytes(), &header, SECRET, 300, 1_700_000_000)
            .unwrap_err();
        assert!(matches!(err, WebhookError::TimestampOutsideTolerance));
    }

    #[test]
    fn header_parts_are_not_trimmed() {
        let header = SignatureHeader::parse("t=1700000000, v1=abc,v1=def").unwrap();
        assert_eq!(header.signatures, vec!["def".to_string()]);

        assert!(matches!(
            SignatureHeader::parse("t=1700000000, v1=abc"),
            Err(WebhookError::MalformedSignatureHeader)
        ));
    }

    #[test]
    fn dispatch_logs_amounts_without_panicking() {
        let event: StripeEvent = serde_json::from_value(json!({
            "id": "evt_4",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_2", "amount_total": "not-a-number"}}
        }))
        .unwrap();
        assert_eq!(dispatch(&event), EventKind::CheckoutSessionCompleted);
    }

    #[test]
    fn verified_non_event_payload_is_invalid() {
        let payload = r#"{"hello":"world"}"#;
        let now = 1_700_000_000;
        let header = sign(SECRET, now, payload);

        let err = construct_event(payload.as_bytes(), &header, SECRET, 300, now).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidPayload(_)));
    }

    #[test]
    fn dispatches_by_event_type() {
        let event: StripeEvent = serde_json::from_str(&completed_event()).unwrap();
        assert_eq!(dispatch(&event), EventKind::CheckoutSessionCompleted);

        let event: StripeEvent = serde_json::from_value(json!({
            "id": "evt_2",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_1", "amount": 1000}}
        }))
        .unwrap();
        assert_eq!(dispatch(&event), EventKind::PaymentIntentSucceeded);

        let event: StripeEvent = serde_json::from_value(json!({
            "id": "evt_3",
            "type": "customer.created",
            "data": {"object": {"id": "cus_1"}}
        }))
        .unwrap();
        assert_eq!(
            dispatch(&event),
            EventKind::Unhandled("customer.created".to_string())
        );
    }

    #[test]
    fn errors_render_as_json() {
        let response = WebhookError::SignatureMismatch.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = WebhookError::SecretNotConfigured.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
