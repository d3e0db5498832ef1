mod api;
mod commands;
mod dispatcher;
mod metrics;
mod render;
mod state;
mod telegram;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marquee_core::{load_config, validate_config, ChatStore, CoverService, ImdbClient, JsonStorage};

use api::create_router;
use dispatcher::Dispatcher;
use state::AppState;
use telegram::{Messenger, TelegramClient};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Backoff after a failed update poll
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Marquee v{} starting", VERSION);

    // Determine config path
    let config_path = std::env::var("MARQUEE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Data directory: {:?}", config.storage.data_dir);

    // Chat storage
    let storage = Arc::new(
        JsonStorage::new(&config.storage.data_dir).context("Failed to open chat storage")?,
    );
    let store = Arc::new(ChatStore::new(storage));
    info!("Chat storage initialized");

    // Movie catalog
    let catalog = Arc::new(
        ImdbClient::new(&config.catalog).context("Failed to create catalog client")?,
    );

    // Cover preparation
    let covers = Arc::new(
        CoverService::new(&config.covers).context("Failed to create cover service")?,
    );

    // Telegram client
    let client = Arc::new(
        TelegramClient::new(&config.bot.token, config.bot.poll_timeout_secs)
            .context("Failed to create Telegram client")?,
    );

    let me = client
        .get_me()
        .await
        .context("getMe failed, check the bot token")?;
    let bot_username = me.username.context("Bot account has no username")?;
    info!("Authorized as @{} ({})", bot_username, me.first_name);

    // Create app state and status API
    let app_state = Arc::new(AppState::new(config.clone()));
    let app = create_router(app_state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting status API on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("Status API error: {}", e);
        }
    });

    let dispatcher = Dispatcher::new(
        Arc::clone(&store),
        catalog,
        covers,
        Arc::clone(&client) as Arc<dyn Messenger>,
        bot_username,
    );

    // Long-poll loop; updates are handled one at a time so commands in
    // a chat apply in the order they were sent.
    info!("Polling for updates");
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut offset = 0i64;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping poll loop");
                break;
            }
            result = client.get_updates(offset) => match result {
                Ok(updates) => {
                    metrics::UPDATES_RECEIVED.inc_by(updates.len() as u64);
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        dispatcher.handle_update(update).await;
                    }
                }
                Err(e) => {
                    metrics::POLL_FAILURES.inc();
                    warn!("Update poll failed: {}", e);
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            },
        }
    }

    // Flush every chat before exiting
    info!("Saving chat state...");
    store.save_all().await;

    let _ = server.await;
    info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
