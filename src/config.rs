//! Environment-driven configuration

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}")]
    Invalid(&'static str),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Storefront backend (catalog, coupons, cart, orders).
    pub backend_url: String,
    /// Shopper-scoped token forwarded to the backend, if any.
    pub backend_token: Option<String>,
    /// Payment-processor proxy; defaults to the backend.
    pub payment_url: String,
    /// Email/bot protection endpoint.
    pub protection_url: String,
    pub nats_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend_url =
            std::env::var("BACKEND_API_URL").map_err(|_| ConfigError::Missing("BACKEND_API_URL"))?;
        let payment_url = std::env::var("PAYMENT_API_URL").unwrap_or_else(|_| backend_url.clone());
        let protection_url = std::env::var("PROTECTION_API_URL")
            .map_err(|_| ConfigError::Missing("PROTECTION_API_URL"))?;
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8083".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        Ok(Self {
            port,
            backend_url,
            backend_token: std::env::var("BACKEND_API_TOKEN").ok(),
            payment_url,
            protection_url,
            nats_url: std::env::var("NATS_URL").ok(),
        })
    }
}
