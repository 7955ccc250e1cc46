//! /stats for owners: how many students use the bot, per year or per branch

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardRemove, MessageId};

use crate::browse::{Conversation, UserBrowseSession};
use crate::core::config;
use crate::core::AppResult;
use crate::storage::db::{self, run_blocking};
use crate::telegram::handlers::{sender_id, HandlerDeps};
use crate::telegram::notice::OWNER_ONLY;
use crate::telegram::onboarding::{parse_year, reply_keyboard, YEARS};
use crate::telegram::Bot;

pub const CALLBACK_PREFIX: &str = "st:";
pub const BY_YEAR_CALLBACK: &str = "st:years";
pub const BY_BRANCH_CALLBACK: &str = "st:branches";

fn choice_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("👥 Users per year", BY_YEAR_CALLBACK)],
        vec![InlineKeyboardButton::callback("🏷️ Users per branch of a year", BY_BRANCH_CALLBACK)],
    ])
}

fn push_counts(text: &mut String, counts: &[(String, i64)]) {
    for (group, count) in counts {
        text.push_str(&format!("\n• {}: {}", group, count));
    }
}

pub fn format_year_counts(total: i64, by_year: &[(String, i64)]) -> String {
    let registered: i64 = by_year.iter().map(|(_, count)| count).sum();
    let mut text = format!("📊 Users\n\nKnown users: {}\nCompleted setup: {}\n", total, registered);
    if by_year.is_empty() {
        text.push_str("\nNobody has completed setup yet.");
    } else {
        push_counts(&mut text, by_year);
    }
    text
}

pub fn format_branch_counts(year: &str, by_branch: &[(String, i64)]) -> String {
    if by_branch.is_empty() {
        return format!("📊 No students registered in {} yet.", year);
    }
    let total: i64 = by_branch.iter().map(|(_, count)| count).sum();
    let mut text = format!("📊 {}: {} students\n", year, total);
    push_counts(&mut text, by_branch);
    text
}

/// /stats
pub async fn handle_stats_command(bot: &Bot, msg: &Message) -> AppResult<()> {
    if !sender_id(msg).is_some_and(config::admin::is_owner) {
        bot.send_message(msg.chat.id, OWNER_ONLY).await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Which statistics would you like to see?")
        .reply_markup(choice_keyboard())
        .await?;
    Ok(())
}

/// Handles `st:*` buttons.
pub async fn handle_stats_callback(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    payload: &str,
    deps: &HandlerDeps,
    session: &UserBrowseSession,
) -> AppResult<()> {
    if !config::admin::is_owner(session.user_id()) {
        log::warn!("User {} pressed an owner-only stats button", session.user_id());
        return Ok(());
    }

    match payload {
        BY_YEAR_CALLBACK => {
            let (total, by_year) = run_blocking(&deps.db_pool, |conn| {
                Ok((db::count_users(conn)?, db::count_by_year(conn)?))
            })
            .await?;
            bot.edit_message_text(chat_id, message_id, format_year_counts(total, &by_year))
                .await?;
        }
        BY_BRANCH_CALLBACK => {
            session.set_conversation(Conversation::StatsYear);
            bot.edit_message_text(chat_id, message_id, "📊 Users per branch").await?;
            bot.send_message(chat_id, "Which year? Type /cancel to stop.")
                .reply_markup(reply_keyboard(&YEARS))
                .await?;
        }
        other => log::debug!("Unknown stats payload '{}'", other),
    }
    Ok(())
}

/// Handles the year typed after choosing per-branch statistics.
pub async fn receive_stats_year(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    session: &UserBrowseSession,
    text: &str,
) -> AppResult<()> {
    let Some(year) = parse_year(text) else {
        bot.send_message(msg.chat.id, "Please select a year from the keyboard.")
            .reply_markup(reply_keyboard(&YEARS))
            .await?;
        return Ok(());
    };

    session.set_conversation(Conversation::None);
    let by_branch = run_blocking(&deps.db_pool, move |conn| db::count_by_branch(conn, year)).await?;
    bot.send_message(msg.chat.id, format_branch_counts(year, &by_branch))
        .reply_markup(KeyboardRemove::new())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_year_counts() {
        let by_year = vec![("1st Year".to_string(), 4), ("2nd Year".to_string(), 9)];
        assert_eq!(
            format_year_counts(15, &by_year),
            "📊 Users\n\nKnown users: 15\nCompleted setup: 13\n\n• 1st Year: 4\n• 2nd Year: 9"
        );
        assert!(format_year_counts(2, &[]).ends_with("Nobody has completed setup yet."));
    }

    #[test]
    fn test_format_branch_counts() {
        let by_branch = vec![("CSE".to_string(), 2), ("ECE".to_string(), 1)];
        assert_eq!(
            format_branch_counts("2nd Year", &by_branch),
            "📊 2nd Year: 3 students\n\n• CSE: 2\n• ECE: 1"
        );
        assert_eq!(format_branch_counts("4th Year", &[]), "📊 No students registered in 4th Year yet.");
    }

    #[test]
    fn test_callbacks_share_prefix() {
        assert!(BY_YEAR_CALLBACK.starts_with(CALLBACK_PREFIX));
        assert!(BY_BRANCH_CALLBACK.starts_with(CALLBACK_PREFIX));
        assert!(crate::browse::MenuToken::parse(BY_BRANCH_CALLBACK).is_none());
    }
}
