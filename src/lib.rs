//! Campusdrive - Telegram bot for course notes and assignments on Google Drive
//!
//! Students pick their year and branch once, then browse
//! `<Year>/<Branch>/<Subject>/{Notes,Assignments}` through inline menus and
//! receive files as Telegram documents.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and rate limiting
//! - `drive`: Drive v3 client, service-account auth and path resolution
//! - `browse`: menu tokens, per-user sessions and the download pipeline
//! - `storage`: SQLite profiles, points and notices
//! - `telegram`: bot setup, dispatcher schema and command handlers
//! - `testing`: in-memory doubles for the drive tree and chat surface

#![allow(clippy::too_many_arguments)]

pub mod browse;
pub mod cli;
pub mod core;
pub mod drive;
pub mod storage;
pub mod telegram;
pub mod testing;

// Re-export commonly used types for convenience
pub use browse::{BrowseController, BrowseKind, DownloadPipeline, SessionStore};
pub use core::{config, AppError, AppResult};
pub use drive::{DriveClient, PathResolver, RemoteTree};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
