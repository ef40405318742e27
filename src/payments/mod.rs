//! Payment flows backed by Stripe

pub mod checkout;
pub mod stripe;
pub mod webhook;

pub use checkout::{CheckoutRequest, CheckoutRequestError};
pub use stripe::StripeService;
