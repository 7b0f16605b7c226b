//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use campuscart_shared::constants::{
    DEFAULT_CURRENCY, DEFAULT_HTTP_PORT, DEFAULT_NEARBY_RADIUS_MILES, MAX_IMAGE_SIZE,
};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `None`, meaning the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Directory holding one sub-directory per image bucket.
    /// Env: `MEDIA_STORAGE_PATH`
    /// Default: `./media`
    pub media_storage_path: PathBuf,

    /// Externally reachable origin used to build public image URLs.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,

    /// Radius of the "nearby" listing view, in miles.
    /// Env: `NEARBY_RADIUS_MILES`
    /// Default: `5.0`
    pub nearby_radius_miles: f64,

    /// Maximum accepted image upload in bytes.
    /// Env: `MAX_IMAGE_SIZE`
    /// Default: 10 MiB
    pub max_image_size: usize,

    // -- Payments --

    /// Secret key for the hosted checkout API. Payments are disabled when unset.
    /// Env: `STRIPE_SECRET_KEY`
    pub stripe_secret_key: Option<String>,

    /// Env: `STRIPE_API_BASE`
    /// Default: `https://api.stripe.com`
    pub stripe_api_base: String,

    /// Origin of the web front-end that hosts the success/cancel pages.
    /// Env: `CHECKOUT_BASE_URL`
    /// Default: same as `public_base_url`
    pub checkout_base_url: String,

    /// Env: `PAYMENT_CURRENCY`
    /// Default: `usd`
    pub payment_currency: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let public_base_url = format!("http://localhost:{DEFAULT_HTTP_PORT}");
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            media_storage_path: PathBuf::from("./media"),
            checkout_base_url: public_base_url.clone(),
            public_base_url,
            nearby_radius_miles: DEFAULT_NEARBY_RADIUS_MILES,
            max_image_size: MAX_IMAGE_SIZE,
            stripe_secret_key: None,
            stripe_api_base: "https://api.stripe.com".to_string(),
            payment_currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("media_storage_path", &self.media_storage_path)
            .field("public_base_url", &self.public_base_url)
            .field("nearby_radius_miles", &self.nearby_radius_miles)
            .field("max_image_size", &self.max_image_size)
            .field("payments_enabled", &self.stripe_secret_key.is_some())
            .field("stripe_api_base", &self.stripe_api_base)
            .field("checkout_base_url", &self.checkout_base_url)
            .field("payment_currency", &self.payment_currency)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = var("DATABASE_PATH").filter(|p| !p.is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(path) = var("MEDIA_STORAGE_PATH").filter(|p| !p.is_empty()) {
            config.media_storage_path = PathBuf::from(path);
        }

        if let Some(url) = var("PUBLIC_BASE_URL").filter(|u| !u.is_empty()) {
            config.public_base_url = url.trim_end_matches('/').to_string();
            config.checkout_base_url = config.public_base_url.clone();
        }

        if let Some(val) = var("NEARBY_RADIUS_MILES") {
            match val.parse::<f64>() {
                Ok(miles) if miles.is_finite() && miles > 0.0 => {
                    config.nearby_radius_miles = miles
                }
                _ => tracing::warn!(value = %val, "Invalid NEARBY_RADIUS_MILES, using default"),
            }
        }

        if let Some(val) = var("MAX_IMAGE_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_image_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_IMAGE_SIZE, using default"),
            }
        }

        // -- Payments --

        if let Some(key) = var("STRIPE_SECRET_KEY").filter(|k| !k.is_empty()) {
            config.stripe_secret_key = Some(key);
        }

        if let Some(url) = var("STRIPE_API_BASE").filter(|u| !u.is_empty()) {
            config.stripe_api_base = url.trim_end_matches('/').to_string();
        }

        if let Some(url) = var("CHECKOUT_BASE_URL").filter(|u| !u.is_empty()) {
            config.checkout_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(currency) = var("PAYMENT_CURRENCY") {
            if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
                config.payment_currency = currency.to_ascii_lowercase();
            } else {
                tracing::warn!(value = %currency, "Invalid PAYMENT_CURRENCY, using default");
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.nearby_radius_miles, 5.0);
        assert!(config.stripe_secret_key.is_none());
        assert_eq!(config.checkout_base_url, config.public_base_url);
    }

    #[test]
    fn test_overrides_applied() {
        let config = lookup(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("PUBLIC_BASE_URL", "https://cart.example.edu/"),
            ("NEARBY_RADIUS_MILES", "0.5"),
            ("PAYMENT_CURRENCY", "EUR"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.public_base_url, "https://cart.example.edu");
        assert_eq!(config.checkout_base_url, "https://cart.example.edu");
        assert_eq!(config.nearby_radius_miles, 0.5);
        assert_eq!(config.payment_currency, "eur");
        assert_eq!(config.stripe_secret_key.as_deref(), Some("sk_test_123"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = lookup(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("NEARBY_RADIUS_MILES", "-3"),
            ("MAX_IMAGE_SIZE", "lots"),
            ("PAYMENT_CURRENCY", "dollars"),
        ]);
        let defaults = ServerConfig::default();
        assert_eq!(config.http_addr, defaults.http_addr);
        assert_eq!(config.nearby_radius_miles, defaults.nearby_radius_miles);
        assert_eq!(config.max_image_size, defaults.max_image_size);
        assert_eq!(config.payment_currency, "usd");
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = lookup(&[("STRIPE_SECRET_KEY", "sk_live_secret")]);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk_live_secret"));
        assert!(rendered.contains("payments_enabled: true"));
    }
}
