use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;

use campusdrive::browse::{BrowseController, ChatSurface, DownloadPipeline, SessionStore};
use campusdrive::cli::{Cli, Commands};
use campusdrive::core::{config, init_logger, log_startup_configuration, rate_limiter::RateLimiter};
use campusdrive::drive::{sort_for_display, DriveClient, ItemKind, PathResolver, RemoteTree};
use campusdrive::storage::{create_pool, db, SqlitePointsLedger};
use campusdrive::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, Leaderboard, TelegramSurface};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, Drive credentials, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Keep panics inside handlers visible in the log file
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // .env must be loaded before any Lazy config value is read
    let _ = dotenv();
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run { webhook }) => {
            log::info!("Running bot in normal mode (webhook: {})", webhook);
            run_bot(webhook).await
        }
        Some(Commands::Resolve { segments }) => run_resolve(segments).await,
        None => {
            log::info!("No command specified, running bot in default mode");
            run_bot(false).await
        }
    }
}

fn build_resolver() -> Result<PathResolver> {
    if config::drive::ROOT_FOLDER_ID.is_empty() {
        anyhow::bail!("GOOGLE_DRIVE_ROOT_FOLDER_ID is not set");
    }
    let client: Arc<dyn RemoteTree> = Arc::new(DriveClient::from_config()?);
    Ok(PathResolver::new(client, config::drive::resolve_cache_ttl()))
}

/// Resolves a folder path and prints its id and children
async fn run_resolve(segments: Vec<String>) -> Result<()> {
    let resolver = build_resolver()?;
    let folder = resolver.resolve(&config::drive::ROOT_FOLDER_ID, &segments).await?;
    println!("{}  {}", folder.id, segments.join("/"));

    for kind in [ItemKind::Folder, ItemKind::File] {
        let mut children = resolver.tree().list_children(&folder.id, kind).await?;
        sort_for_display(&mut children);
        for child in children {
            println!("  [{}] {}  {}", child.kind, child.id, child.name);
        }
    }
    Ok(())
}

/// Periodically drops sessions nobody has used for a while.
fn spawn_session_sweeper(sessions: Arc<SessionStore>) {
    let idle = config::browse::session_idle();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config::browse::session_sweep_interval());
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(idle);
            if evicted > 0 {
                log::debug!("Evicted {} idle sessions, {} remain", evicted, sessions.len());
            }
        }
    });
}

async fn run_bot(use_webhook: bool) -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    log::info!("Starting bot...");
    log_startup_configuration();

    let bot = create_bot()?;
    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );

    match db::run_blocking(&db_pool, db::count_users).await {
        Ok(count) => log::info!("Known users: {}", count),
        Err(e) => log::warn!("Could not count users: {}", e),
    }

    let resolver = build_resolver()?;
    let root_id = config::drive::ROOT_FOLDER_ID.clone();
    let surface: Arc<dyn ChatSurface> = Arc::new(TelegramSurface::new(bot.clone()));

    let pipeline = DownloadPipeline::new(
        Arc::clone(resolver.tree()),
        Arc::clone(&surface),
        config::browse::slow_fetch_notice(),
    )
    .with_ledger(Arc::new(SqlitePointsLedger::new(Arc::clone(&db_pool))));
    let browse = Arc::new(BrowseController::new(resolver.clone(), surface, root_id.clone(), pipeline));
    let leaderboard = Arc::new(Leaderboard::new(
        resolver,
        root_id,
        config::leaderboard::branch_totals_ttl(),
    ));

    let sessions = Arc::new(SessionStore::new());
    spawn_session_sweeper(Arc::clone(&sessions));

    let handler_deps = HandlerDeps::new(
        Arc::clone(&db_pool),
        sessions,
        browse,
        Arc::new(RateLimiter::new(config::browse::cooldown())),
        leaderboard,
    );
    let handler = schema(handler_deps);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler).enable_ctrlc_handler().build();
    let error_handler = LoggingErrorHandler::with_custom_text("An error from the update listener");

    let webhook_url = if use_webhook { config::WEBHOOK_URL.clone() } else { None };
    if use_webhook && webhook_url.is_none() {
        log::warn!("--webhook given but WEBHOOK_URL is not set, falling back to long polling");
    }

    match webhook_url {
        Some(url) => {
            let address = SocketAddr::from(([0, 0, 0, 0], *config::WEBHOOK_PORT));
            let options = webhooks::Options::new(address, url::Url::parse(&url)?);
            let listener = webhooks::axum(bot, options).await?;

            log::info!("🎉 Bot initialization complete in {:.2}s", bot_init_start.elapsed().as_secs_f64());
            log::info!("📡 Receiving updates via webhook {} (listening on {})", url, address);
            dispatcher.dispatch_with_listener(listener, error_handler).await;
        }
        None => {
            let listener = teloxide::update_listeners::Polling::builder(bot)
                .drop_pending_updates()
                .build();

            log::info!("🎉 Bot initialization complete in {:.2}s", bot_init_start.elapsed().as_secs_f64());
            log::info!("📡 Receiving updates via long polling");
            dispatcher.dispatch_with_listener(listener, error_handler).await;
        }
    }

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
