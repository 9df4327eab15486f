//! tagscan-server - tag scan logger
//!
//! Accepts scans from reader hardware, logs plays of known items, arms unknown
//! tags for binding, and notifies over Telegram.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tagscan_common::config::{load_config_file, ConfigLayer, Settings};
use tagscan_common::{open_store, StoreBackend};
use tagscan_server::notify::{LogNotifier, Notifier, TelegramNotifier};
use tagscan_server::scan::{ResolverOptions, ScanResolver};
use tagscan_server::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for tagscan-server
///
/// Every flag overrides the config file; unset flags fall through to it.
#[derive(Parser, Debug)]
#[command(name = "tagscan-server")]
#[command(about = "Tag scan logger with Telegram notifications")]
#[command(version)]
struct Args {
    /// Config file (default: <config dir>/tagscan/config.toml if present)
    #[arg(short, long, env = "TAGSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "TAGSCAN_PORT")]
    port: Option<u16>,

    /// Directory holding the database file
    #[arg(long, env = "TAGSCAN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Storage backend: sqlite or kv
    #[arg(long, env = "TAGSCAN_BACKEND")]
    backend: Option<StoreBackend>,

    /// Token expected in `Authorization: Token <value>`
    #[arg(long, env = "TAGSCAN_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "TAGSCAN_TELEGRAM_TOKEN", hide_env_values = true)]
    telegram_token: Option<String>,

    /// Telegram chat ids to notify, comma separated
    #[arg(
        long,
        env = "TAGSCAN_TELEGRAM_CHAT_IDS",
        value_delimiter = ',',
        allow_negative_numbers = true
    )]
    telegram_chat_ids: Vec<i64>,

    /// Telegram Bot API base URL
    #[arg(long, env = "TAGSCAN_TELEGRAM_API_URL")]
    telegram_api_url: Option<String>,

    /// Public URL of the admin UI, linked from unknown-tag notifications
    #[arg(long, env = "TAGSCAN_BASE_URL")]
    base_url: Option<String>,

    /// Time budget for resolving one scan, in seconds
    #[arg(long, env = "TAGSCAN_SCAN_TIMEOUT_SECS")]
    scan_timeout_secs: Option<u64>,

    /// Maximum number of scans resolved at once
    #[arg(long, env = "TAGSCAN_MAX_CONCURRENT_SCANS")]
    max_concurrent_scans: Option<usize>,
}

impl Args {
    fn into_layer(self) -> ConfigLayer {
        ConfigLayer {
            port: self.port,
            data_dir: self.data_dir,
            backend: self.backend,
            api_token: self.api_token,
            telegram_token: self.telegram_token,
            telegram_chat_ids: Some(self.telegram_chat_ids).filter(|ids| !ids.is_empty()),
            telegram_api_url: self.telegram_api_url,
            base_url: self.base_url,
            scan_timeout_secs: self.scan_timeout_secs,
            max_concurrent_scans: self.max_concurrent_scans,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tagscan_server=info,tagscan_common=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting tagscan-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let file_layer =
        load_config_file(args.config.as_deref()).context("Failed to load config file")?;
    let settings =
        Settings::from_layers(args.into_layer(), file_layer).context("Invalid configuration")?;

    let store = open_store(settings.backend, &settings.data_dir)
        .await
        .context("Failed to open store")?;

    let notifier: Arc<dyn Notifier> = match &settings.telegram {
        Some(telegram) => {
            info!(chats = telegram.chat_ids.len(), "Telegram notifications enabled");
            Arc::new(
                TelegramNotifier::new(telegram, settings.scan_timeout)
                    .context("Failed to build Telegram client")?,
            )
        }
        None => {
            warn!("Telegram not configured; notifications are logged only");
            Arc::new(LogNotifier)
        }
    };

    if settings.api_token.is_none() {
        warn!("No API token configured; API endpoints are unauthenticated");
    }

    let resolver = Arc::new(ScanResolver::new(
        Arc::clone(&store),
        notifier,
        ResolverOptions::from(&settings),
    ));

    let state = AppState::new(store, Arc::clone(&resolver), settings.api_token.clone());
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("tagscan-server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    resolver.shutdown(settings.scan_timeout).await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
