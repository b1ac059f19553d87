//! Auth service
//!
//! Registers identities and issues and rotates access/refresh token pairs.

use auth_service::clock::{Clock, SystemClock};
use auth_service::config::{Config, ConfigError, LogLevel, StoreBackend};
use auth_service::crypto::random::SystemRandomSource;
use auth_service::crypto::TokenIssuer;
use auth_service::observability;
use auth_service::repositories::{IdentityStore, InMemoryIdentityStore, PgIdentityStore};
use auth_service::routes::{self, AppState};
use auth_service::services::{AuthService, AuthSettings};
use secrecy::{ExposeSecret, SecretBox};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_tracing(LogLevel::from_env());

    info!("Starting auth service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        store_backend = ?config.store_backend,
        access_token_ttl_seconds = config.access_token_ttl_seconds,
        refresh_token_ttl_seconds = config.refresh_token_ttl_seconds,
        bcrypt_cost = config.bcrypt_cost,
        "Configuration loaded successfully"
    );

    let store = build_store(&config).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let issuer = Arc::new(TokenIssuer::new(
        SecretBox::new(Box::new(config.jwt_secret.expose_secret().clone())),
        config.bcrypt_cost,
        Arc::new(SystemRandomSource::new()),
        Arc::clone(&clock),
    ));
    let auth = Arc::new(AuthService::new(
        Arc::clone(&store),
        issuer,
        clock,
        AuthSettings::from_config(&config),
    ));

    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        auth,
        store,
        health_ping_timeout: Duration::from_millis(config.health_ping_timeout_ms),
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Auth service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(config.drain_seconds))
    .await?;

    info!("Auth service shutdown complete");

    Ok(())
}

/// Connect the configured identity store.
async fn build_store(config: &Config) -> Result<Arc<dyn IdentityStore>, Box<dyn std::error::Error>> {
    match config.store_backend {
        StoreBackend::Memory => {
            warn!("Using in-memory identity store; data is lost on restart");
            Ok(Arc::new(InMemoryIdentityStore::new()))
        }
        StoreBackend::Postgres => {
            info!("Connecting to database...");
            let db_url = config
                .database_url_with_statement_timeout()
                .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(20)
                .min_connections(2)
                .acquire_timeout(Duration::from_millis(config.store_timeout_ms))
                .idle_timeout(Duration::from_secs(600))
                .max_lifetime(Duration::from_secs(1800))
                .connect(&db_url)
                .await
                .map_err(|e| {
                    error!("Failed to connect to database: {}", e);
                    e
                })?;

            info!("Database connection established");

            sqlx::migrate!("../../migrations")
                .run(&pool)
                .await
                .map_err(|e| {
                    error!("Failed to run database migrations: {}", e);
                    e
                })?;

            info!("Database migrations applied");

            Ok(Arc::new(PgIdentityStore::new(pool)))
        }
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is complete.
async fn shutdown_signal(drain_secs: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (AUTH_DRAIN_SECONDS=0)");
    }
}
