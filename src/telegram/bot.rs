//! Bot initialization and the command list
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Registration of the command menu shown by Telegram clients

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::telegram::Bot;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "set up your profile")]
    Start,
    #[command(description = "show this help message")]
    Help,
    #[command(description = "get notes for a subject")]
    Notes,
    #[command(description = "get assignments for a subject")]
    Assignments,
    #[command(description = "check your current settings")]
    Myinfo,
    #[command(description = "clear your data and start over")]
    Reset,
    #[command(description = "cancel the current setup or notice")]
    Cancel,
    #[command(description = "see the top study champions")]
    Leaderboard,
    #[command(description = "view the latest notice")]
    Notice,
    #[command(description = "post a new notice (owners only)")]
    Postnotice,
    #[command(description = "message all users, a year or a branch (owners only)")]
    Broadcast(String),
    #[command(description = "user counts by year and branch (owners only)")]
    Stats,
    #[command(description = "browse notes of any branch (owners only)")]
    Getnotes,
    #[command(description = "browse assignments of any branch (owners only)")]
    Getassignments,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Missing token or invalid `BOT_API_URL`
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN is not set");
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    // Check if a local Bot API server is configured
    let bot = match std::env::var("BOT_API_URL") {
        Ok(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        Err(_) => bot,
    };

    Ok(bot)
}

/// Commands shown in the Telegram client menu. Owner commands stay hidden.
pub fn public_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "set up your profile"),
        BotCommand::new("notes", "get notes for a subject"),
        BotCommand::new("assignments", "get assignments for a subject"),
        BotCommand::new("leaderboard", "see the top study champions"),
        BotCommand::new("notice", "view the latest notice"),
        BotCommand::new("myinfo", "check your current settings"),
        BotCommand::new("reset", "clear your data and start over"),
        BotCommand::new("help", "show all commands"),
    ]
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(public_commands()).await?;
    Ok(())
}
