//! # dlms-server
//!
//! HTTP backend of the driver license management system.
//!
//! This binary provides:
//! - **Admin sessions**: login against the configured admin secret, signed
//!   24-hour bearer tokens, logout with a revocation cache
//! - **License records** in SQLite, written only through the authenticated
//!   create/update/delete endpoints
//! - **Image buckets** on the filesystem for license photos and signatures,
//!   served publicly under `/storage`
//! - **Per-IP rate limiting**, with a tighter budget on the login route

mod api;
mod blob_store;
mod config;
mod error;
mod licenses;
mod rate_limit;
mod seed;
mod sessions;

use std::sync::Arc;

use chrono::Utc;
use dlms_store::Database;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::blob_store::BlobStore;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;
use crate::sessions::SessionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dlms_server=debug")),
        )
        .init();

    info!("Starting DLMS server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration (no admin secret, no server)
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env()?;
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;

    let blob_store = Arc::new(
        BlobStore::new(config.blob_storage_path.clone(), &config.public_base_url).await?,
    );

    if config.seed_sample_data {
        seed::seed_sample_data(&db, &blob_store, Utc::now().date_naive())?;
    }

    let sessions = SessionManager::new(&config.admin_secret, &config.admin_email);

    // 10 req/s sustained with a burst of 30; login 5 attempts then 1 per 12s
    let rate_limiter = RateLimiter::default();

    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        blob_store,
        sessions: sessions.clone(),
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(600.0).await;
        }
    });

    // Periodic revocation cleanup (every 10 minutes)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
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
