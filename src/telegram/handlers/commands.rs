//! Command handlers for the simple user commands

use teloxide::prelude::*;
use teloxide::types::KeyboardRemove;

use super::types::{sender_id, HandlerDeps};
use crate::browse::messages::SETUP_REQUIRED;
use crate::browse::{BrowseKind, ChatRef, UserBrowseSession};
use crate::core::config;
use crate::core::AppResult;
use crate::storage::db::{self, run_blocking};
use crate::telegram::onboarding::cancel_conversation;
use crate::telegram::Bot;

const USER_HELP: &str = "📚 Here's what I can do:\n\n\
    /notes - Browse lecture notes\n\
    /assignments - Browse assignments\n\
    /notice - Show the latest notice\n\
    /leaderboard - Top downloaders\n\
    /myinfo - Your saved details\n\
    /reset - Clear your details and start over\n\
    /cancel - Stop the current setup step";

const OWNER_HELP: &str = "\n\n👑 Owner commands:\n\
    /postnotice - Post a new notice\n\
    /broadcast - Message all users, a year or a branch\n\
    /broadcast <message> - Message every user at once\n\
    /stats - User counts by year and branch\n\
    /getnotes - Browse notes of any branch\n\
    /getassignments - Browse assignments of any branch";

pub fn help_text(is_owner: bool) -> String {
    let mut text = USER_HELP.to_string();
    if is_owner {
        text.push_str(OWNER_HELP);
    }
    text
}

/// /help
pub async fn handle_help_command(bot: &Bot, msg: &Message) -> AppResult<()> {
    let is_owner = sender_id(msg).is_some_and(config::admin::is_owner);
    bot.send_message(msg.chat.id, help_text(is_owner)).await?;
    Ok(())
}

/// /myinfo
pub async fn handle_myinfo_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, session: &UserBrowseSession) -> AppResult<()> {
    let Some(profile) = session.student_profile() else {
        bot.send_message(msg.chat.id, SETUP_REQUIRED).await?;
        return Ok(());
    };

    let user_id = session.user_id();
    let points = run_blocking(&deps.db_pool, move |conn| db::get_user(conn, user_id))
        .await?
        .map(|user| user.points)
        .unwrap_or_default();

    bot.send_message(
        msg.chat.id,
        format!(
            "👤 Your details\n\nName: {}\nYear: {}\nBranch: {}\nPoints: {}",
            profile.name, profile.year, profile.branch, points
        ),
    )
    .await?;
    Ok(())
}

/// /reset: forgets the profile but keeps the points.
pub async fn handle_reset_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, session: &UserBrowseSession) -> AppResult<()> {
    let user_id = session.user_id();
    let name = session.profile().name.unwrap_or_else(|| "there".to_string());

    deps.sessions.reset(user_id);
    run_blocking(&deps.db_pool, move |conn| db::clear_profile(conn, user_id)).await?;
    deps.rate_limiter.remove_rate_limit(user_id).await;
    log::info!("User {} reset their profile", user_id);

    bot.send_message(
        msg.chat.id,
        format!("Okay {}, I've cleared your data. Please use /start to set up again.", name),
    )
    .reply_markup(KeyboardRemove::new())
    .await?;
    Ok(())
}

/// /cancel
pub async fn handle_cancel_command(bot: &Bot, msg: &Message, session: &UserBrowseSession) -> AppResult<()> {
    let had_keyboard = session.conversation().uses_reply_keyboard();
    let reply = bot.send_message(msg.chat.id, cancel_conversation(session));
    if had_keyboard {
        reply.reply_markup(KeyboardRemove::new()).await?;
    } else {
        reply.await?;
    }
    Ok(())
}

/// /notes and /assignments
pub async fn handle_browse_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    session: &UserBrowseSession,
    kind: BrowseKind,
) -> AppResult<()> {
    if session.student_profile().is_none() {
        bot.send_message(msg.chat.id, SETUP_REQUIRED).await?;
        return Ok(());
    }

    if let Err(remaining) = deps.rate_limiter.try_acquire(session.user_id()).await {
        bot.send_message(
            msg.chat.id,
            format!("⏳ Please wait {} seconds before browsing again.", remaining.as_secs().max(1)),
        )
        .await?;
        return Ok(());
    }

    deps.browse.start_browse(session, ChatRef(msg.chat.id.0), kind).await
}
