use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use drinks_api::auth::{Authorizer, JwksCache};
use drinks_api::config::AppConfig;
use drinks_api::database::postgres::seed_drink;
use drinks_api::database::{DrinkStore, MemoryDrinkStore, PgDrinkStore};
use drinks_api::server::{app, AppState};

#[derive(Debug, Parser)]
#[command(name = "drinks-api", version, about = "Drink catalog API")]
struct Cli {
    /// Address to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Keep drinks in process memory instead of PostgreSQL
    #[arg(long)]
    memory: bool,

    /// Drop all drinks and start from a single seeded record
    #[arg(long)]
    reset_db: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, AUTH0_DOMAIN, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("drinks_api=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    tracing::info!("Starting drinks API in {:?} mode", config.environment);

    let mut postgres = None;
    let store: Arc<dyn DrinkStore> = if cli.memory {
        let store = MemoryDrinkStore::new();
        if cli.reset_db {
            store.create(seed_drink()).await?;
        }
        tracing::warn!("Using in-memory store; drinks are lost on exit");
        Arc::new(store)
    } else {
        let store = PgDrinkStore::connect(&config.database)
            .await
            .context("failed to connect to database")?;
        if cli.reset_db {
            store.reset().await.context("failed to reset database")?;
        } else {
            store.setup().await.context("failed to prepare database schema")?;
        }
        postgres = Some(store.clone());
        Arc::new(store)
    };

    let keys = JwksCache::new(
        config.auth.jwks_url.clone(),
        Duration::from_secs(config.auth.jwks_cache_ttl_secs),
    );
    let authorizer = Authorizer::new(&config.auth, Arc::new(keys));
    let state = AppState::new(store, Arc::new(authorizer));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Drinks API listening on http://{}", bind_addr);

    axum::serve(listener, app(state, &config.security))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(store) = postgres {
        store.close().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
