//! # campuscart-server
//!
//! HTTP backend for the CampusCart campus bartering marketplace.
//!
//! This binary provides:
//! - **Listings**: create, browse (category and proximity filters), delete
//! - **Trade requests**: barter offers and purchase requests with the
//!   accept / reject / cancel / dual-confirmation lifecycle
//! - **Chat** per request, with a Server-Sent Events live stream
//! - **Image storage** for listing and offer photos
//! - **Checkout sessions** for priced listings
//!
//! Authentication happens upstream; the acting user id arrives in the
//! `x-user-id` header.

mod api;
mod auth;
mod chat;
mod config;
mod error;
mod lifecycle;
mod listings;
mod media_store;
mod payments;

use std::sync::Arc;

use campuscart_shared::constants::APP_NAME;
use campuscart_store::Database;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::media_store::MediaStore;

/// The one SQLite connection, shared by every service.
pub(crate) type SharedDb = Arc<Mutex<Database>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,campuscart_server=debug")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let database = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    info!(path = ?database.path(), "Database ready");
    let db: SharedDb = Arc::new(Mutex::new(database));

    // Media store (creates bucket directories if missing)
    let media = Arc::new(
        MediaStore::new(config.media_storage_path.clone(), config.max_image_size).await?,
    );

    let app_state = AppState::new(db, media, &config)?;
    if !app_state.payments.is_enabled() {
        warn!("STRIPE_SECRET_KEY not set, checkout sessions are disabled");
    }

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

#[cfg(test)]
mod test_support {
    use super::*;

    pub fn shared_db() -> SharedDb {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }
}
