//! Configuration module - environment variable parsing

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Default origin used for checkout redirects when none is configured
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:5173";

/// Default Stripe REST API base
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Default webhook timestamp tolerance, matching Stripe's client libraries
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Deployment environment
    pub environment: Environment,

    /// Stripe secret API key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: Option<String>,
    /// Stripe REST API base URL
    pub stripe_api_base: String,
    /// Maximum accepted age of a webhook signature timestamp, 0 disables the check
    pub webhook_tolerance_secs: i64,

    /// Public origin the hosted checkout redirects back to
    pub public_base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let environment = match lookup("APP_ENV") {
            Some(value) => value.parse()?,
            None => Environment::Production,
        };

        let webhook_tolerance_secs = match lookup("WEBHOOK_TOLERANCE_SECS") {
            Some(value) => value
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs >= 0)
                .ok_or(ConfigError::InvalidNumber("WEBHOOK_TOLERANCE_SECS"))?,
            None => DEFAULT_WEBHOOK_TOLERANCE_SECS,
        };

        // Netlify exposes the site origin as URL
        let public_base_url = lookup("PUBLIC_BASE_URL")
            .or_else(|| lookup("URL"))
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            environment,

            stripe_secret_key: lookup("STRIPE_SECRET_KEY")
                .filter(|key| !key.is_empty())
                .ok_or(ConfigError::Missing("STRIPE_SECRET_KEY"))?,
            stripe_webhook_secret: lookup("STRIPE_WEBHOOK_SECRET").filter(|s| !s.is_empty()),
            stripe_api_base: trim_origin(
                lookup("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
            ),
            webhook_tolerance_secs,

            public_base_url: trim_origin(public_base_url),
        })
    }
}

fn trim_origin(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Deployment environment, controls how much error detail reaches clients
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Whether raw upstream error text may be echoed to clients
    pub fn exposes_error_details(&self) -> bool {
        !matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "staging" | "preview" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),

    #[error("Unknown deployment environment: {0}")]
    InvalidEnvironment(String),
}

#[cfg(test)]
impl Config {
    /// Configuration pointing at a fake Stripe API
    pub fn for_tests(stripe_api_base: &str) -> Self {
        Self {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".to_string(),
            environment: Environment::Development,
            stripe_secret_key: "sk_test_123".to_string(),
            stripe_webhook_secret: Some("whsec_test_secret".to_string()),
            stripe_api_base: stripe_api_base.to_string(),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
            public_base_url: "https://shop.example.com".to_string(),
        }
    }
}
