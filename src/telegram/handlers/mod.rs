//! Telegram bot handler tree configuration
//!
//! The dispatcher schema lives here, next to the dependencies it captures, so
//! polling and webhook mode share one handler tree.

mod commands;
mod schema;
mod types;

pub use commands::help_text;
pub use schema::schema;
pub use types::{sender_id, user_id_of, HandlerDeps, HandlerError};
