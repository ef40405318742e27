//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::payments::StripeService;

/// Shared application state, immutable after startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stripe: StripeService,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize Stripe
        let stripe = StripeService::new(&config);

        Self { config, stripe }
    }
}
