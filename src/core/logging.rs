//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file), honouring `RUST_LOG`
//! - Startup summary of the Drive/browse configuration

use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use crate::core::config;

/// Default filter when `RUST_LOG` is not set. HTTP internals are noisy at info.
const DEFAULT_FILTER: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn,h2=warn";

/// Initialize logger for both console and file output
///
/// `log::` records are bridged into the tracing subscriber, so both macro
/// families end up in the same sinks.
///
/// # Arguments
/// * `log_file_path` - Path to the log file (opened in append mode)
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file: {}", e))?;

    tracing_log::LogTracer::init().map_err(|e| anyhow::anyhow!("Failed to bridge log records: {}", e))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_writer(std::io::stderr.and(Arc::new(log_file)))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective Drive and browse configuration at startup
///
/// Never prints credentials: only whether they are present.
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("📂 Drive Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if config::drive::ROOT_FOLDER_ID.is_empty() {
        log::error!("❌ GOOGLE_DRIVE_ROOT_FOLDER_ID: not set, browsing will not work");
    } else {
        log::info!("✅ GOOGLE_DRIVE_ROOT_FOLDER_ID: {}", *config::drive::ROOT_FOLDER_ID);
    }

    match config::drive::SERVICE_ACCOUNT.as_deref() {
        Some(value) if std::path::Path::new(value).exists() => {
            log::info!("✅ SERVICE_ACCOUNT_JSON: key file {}", value);
        }
        Some(_) => log::info!("✅ SERVICE_ACCOUNT_JSON: inline credentials"),
        None => log::error!("❌ SERVICE_ACCOUNT_JSON: not set"),
    }

    log::info!("   Drive API: {}", *config::drive::API_URL);
    log::info!("   Name matching: {}", *config::drive::NAME_MATCH);
    match config::drive::resolve_cache_ttl() {
        Some(ttl) => log::info!("   Resolve cache TTL: {}s", ttl.as_secs()),
        None => log::info!("   Resolve cache: disabled"),
    }
    log::info!("   Slow fetch notice after: {}s", *config::browse::SLOW_FETCH_NOTICE_SECS);
    log::info!("   Browse cooldown: {}s", *config::browse::COOLDOWN_SECS);
    log::info!("   Session idle timeout: {}s", *config::browse::SESSION_IDLE_SECS);
    log::info!("   Owners configured: {}", config::admin::OWNER_IDS.len());
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
