//! HTTP route definitions

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::app::AppState;
use crate::http::pages::{cancel_page, success_page};
use crate::payments::webhook::stripe_webhook_handler;
use crate::payments::{CheckoutRequest, CheckoutRequestError};
use crate::util::time::uptime_secs;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Browsers call the checkout endpoint from any storefront origin.
    // The layer also answers every OPTIONS request as a preflight.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route(
            "/create-checkout",
            post(checkout_handler).fallback(method_not_allowed),
        )
        .route(
            "/webhook",
            post(stripe_webhook_handler).fallback(method_not_allowed),
        );

    let page_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/success", get(success_page))
        .route("/cancel", get(cancel_page));

    Router::new()
        .merge(api_routes)
        .merge(page_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    environment: &'static str,
    webhooks_enabled: bool,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        environment: state.config.environment.as_str(),
        webhooks_enabled: state.config.stripe_webhook_secret.is_some(),
    })
}

// ============================================================================
// Payment endpoints
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse {
    url: String,
    session_id: String,
}

async fn checkout_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CheckoutResponse>, AppError> {
    let request = CheckoutRequest::from_json(&body).map_err(|e| {
        warn!(error = %e, "Rejected checkout request");
        AppError::from(e)
    })?;

    let response = state
        .stripe
        .create_checkout_session(&request)
        .await
        .map_err(|e| {
            error!(error = %e, title = %request.title, "Checkout session creation failed");
            AppError::Internal {
                message: "Failed to create checkout session".to_string(),
                details: state
                    .config
                    .environment
                    .exposes_error_details()
                    .then(|| e.to_string()),
            }
        })?;

    Ok(Json(CheckoutResponse {
        url: response.url,
        session_id: response.session_id,
    }))
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        details: Option<String>,
    },
}

impl From<CheckoutRequestError> for AppError {
    fn from(err: CheckoutRequestError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error, details) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_string(),
                None,
            ),
            AppError::Internal { message, details } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message, details)
            }
        };

        (status, Json(ErrorBody { error, details })).into_response()
    }
}
