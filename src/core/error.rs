use thiserror::Error;

use crate::drive::{RemoteError, ResolveError};

/// Centralized error types for the application
///
/// Layer-specific errors (`RemoteError`, `ResolveError`) convert into this enum
/// at the boundary where they stop being handled locally.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Google Drive transport/API errors
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Path resolution failures
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Chat surface errors that did not come from teloxide (e.g. test doubles)
    #[error("Chat error: {0}")]
    Chat(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Anyhow(anyhow::anyhow!("blocking task failed: {}", err))
    }
}
