use std::net::SocketAddr;
use std::sync::Arc;

use aerobook_api::{app, AppState};
use aerobook_core::notification::NotificationTransport;
use aerobook_reconcile::{GatewayRegistry, NotificationDispatcher, Repositories};
use aerobook_store::app_config::Config;
use aerobook_store::{DbClient, InMemoryStore, LogMailer, RealtimeHub, RedisClient, SmtpMailer};
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aerobook_api=debug,aerobook_reconcile=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting AeroBook API on port {}", config.server.port);

    // Postgres when configured, otherwise everything lives in memory.
    let repos = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Repositories::postgres(&db)
        }
        None => {
            tracing::warn!("No database configured; using the in-memory store");
            Repositories::in_memory(Arc::new(InMemoryStore::new()))
        }
    };

    // Redis is optional; realtime still works in-process without it.
    let redis = match &config.redis.url {
        Some(url) => match RedisClient::new(url).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("Redis unavailable, realtime stays in-process: {}", e);
                None
            }
        },
        None => None,
    };
    let hub = RealtimeHub::new(redis);

    let mailer: Arc<dyn NotificationTransport> = match config.smtp.as_ref().filter(|s| s.is_configured()) {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp).context("Failed to build SMTP transport")?),
        None => {
            tracing::warn!("SMTP not configured; emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let dispatcher = Arc::new(
        NotificationDispatcher::new(repos.notifications.clone(), repos.users.clone())
            .with_transport(mailer)
            .with_realtime(Arc::new(hub.clone())),
    );
    let gateways = GatewayRegistry::from_config(&config).context("Failed to build payment gateways")?;

    let app_state = AppState::new(&config, repos, gateways, dispatcher, hub);
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
