//! tutor_market - Tutoring Marketplace Backend API
//!
//! Serves session booking, the session lifecycle, reviews, payments and
//! educator payouts over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tutor_market::config::{LogFormat, StorageBackend};
use tutor_market::domain::{Role, User};
use tutor_market::{build_router, db, AppState, Config, InMemoryStore, PgStore, SharedStore};

/// Initialize tracing/logging
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tutor_market=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Connect to Postgres and make sure migrations have been applied
async fn connect_postgres(config: &Config) -> anyhow::Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres backend"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await?;

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");
    Ok(pool)
}

/// Memory backend, optionally seeded with an admin client and user
fn memory_store(config: &Config) -> anyhow::Result<InMemoryStore> {
    let store = InMemoryStore::new();

    if let Some(raw_key) = config.bootstrap_api_key.as_deref() {
        let key = store.insert_api_key(raw_key, "bootstrap", &["admin"])?;
        let admin = User::register(
            "admin@localhost",
            "Bootstrap".to_string(),
            "Admin".to_string(),
            None,
            Role::Admin,
            Utc::now(),
        )?;
        store.insert_admin(&admin)?;
        tracing::info!(
            api_key_id = %key.id,
            admin_user_id = %admin.id,
            "Seeded bootstrap API key and admin user"
        );
    }

    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(
        environment = %config.environment,
        storage = ?config.storage_backend,
        gateway = ?config.payment_gateway,
        "Starting tutor_market server"
    );

    let (store, pool): (SharedStore, Option<PgPool>) = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = connect_postgres(&config).await?;
            (Arc::new(PgStore::new(pool.clone())), Some(pool))
        }
        StorageBackend::Memory => {
            if config.is_production() {
                tracing::warn!("Memory backend in production: all state is lost on exit");
            }
            (Arc::new(memory_store(&config)?), None)
        }
    };

    let app = build_router(AppState::new(store, config.payment_gateway.build()));

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database connections closed");
    }
    tracing::info!("Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
