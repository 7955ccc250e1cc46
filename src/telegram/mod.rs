//! Telegram bot integration and handlers

pub mod admin;
pub mod bot;
pub mod handlers;
pub mod leaderboard;
pub mod notice;
pub mod onboarding;
pub mod stats;
pub mod surface;

/// Bot type used across handlers
pub type Bot = teloxide::Bot;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use leaderboard::Leaderboard;
pub use surface::TelegramSurface;
