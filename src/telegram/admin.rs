//! Owner-only tools: broadcasts and browsing any branch
//!
//! `/broadcast <text>` goes straight to every known user. A bare `/broadcast`
//! first asks for the audience (everyone, one year, or one branch of a year)
//! and then forwards whatever message the owner sends next.

use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardRemove, MessageId};

use crate::browse::{Audience, BrowseKind, ChatRef, Conversation, UserBrowseSession};
use crate::core::config;
use crate::core::AppResult;
use crate::storage::db::{self, run_blocking};
use crate::telegram::handlers::{sender_id, HandlerDeps};
use crate::telegram::notice::OWNER_ONLY;
use crate::telegram::onboarding::{drive_branches, parse_year, reply_keyboard, BranchLookup, YEARS};
use crate::telegram::Bot;

/// Pause between messages, keeping well under Telegram's global send limit
const SEND_INTERVAL: Duration = Duration::from_millis(50);

pub const BROADCAST_PREFIX: &str = "bc:";
pub const TO_ALL_CALLBACK: &str = "bc:all";
pub const TO_YEAR_CALLBACK: &str = "bc:year";
pub const TO_BRANCH_CALLBACK: &str = "bc:branch";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

impl BroadcastReport {
    pub fn summary(&self) -> String {
        format!(
            "📣 Broadcast finished: {} delivered, {} failed.",
            self.delivered, self.failed
        )
    }
}

/// What gets delivered to each recipient.
enum Content<'a> {
    Text(&'a str),
    /// A copy of one of the owner's messages, whatever its type
    Copy { from: ChatId, message: MessageId },
}

fn is_owner(msg: &Message) -> bool {
    sender_id(msg).is_some_and(config::admin::is_owner)
}

fn audience_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📢 Everyone", TO_ALL_CALLBACK)],
        vec![InlineKeyboardButton::callback("🎓 One year", TO_YEAR_CALLBACK)],
        vec![InlineKeyboardButton::callback("🏷️ One branch", TO_BRANCH_CALLBACK)],
    ])
}

fn message_prompt(audience: &Audience) -> String {
    format!(
        "Send the message to broadcast to {}. Any kind of message works. Type /cancel to stop.",
        audience
    )
}

async fn deliver(bot: &Bot, recipients: &[i64], content: Content<'_>) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for &user_id in recipients {
        let sent = match &content {
            Content::Text(text) => bot.send_message(ChatId(user_id), *text).await.map(|_| ()),
            Content::Copy { from, message } => bot.copy_message(ChatId(user_id), *from, *message).await.map(|_| ()),
        };
        match sent {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                log::warn!("Broadcast to {} failed: {}", user_id, e);
                report.failed += 1;
            }
        }
        tokio::time::sleep(SEND_INTERVAL).await;
    }
    report
}

async fn broadcast(bot: &Bot, msg: &Message, deps: &HandlerDeps, audience: Audience, content: Content<'_>) -> AppResult<()> {
    let query_audience = audience.clone();
    let recipients = run_blocking(&deps.db_pool, move |conn| db::user_ids_in(conn, &query_audience)).await?;
    if recipients.is_empty() {
        bot.send_message(msg.chat.id, format!("Nobody to send to in {}.", audience))
            .await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, format!("Sending to {} users...", recipients.len()))
        .await?;
    let report = deliver(bot, &recipients, content).await;

    log::info!(
        "Broadcast by {:?} to {}: {} delivered, {} failed",
        sender_id(msg),
        audience,
        report.delivered,
        report.failed
    );
    bot.send_message(msg.chat.id, report.summary()).await?;
    Ok(())
}

/// /broadcast and /broadcast <text>
pub async fn handle_broadcast_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    session: &UserBrowseSession,
    text: &str,
) -> AppResult<()> {
    if !is_owner(msg) {
        bot.send_message(msg.chat.id, OWNER_ONLY).await?;
        return Ok(());
    }

    let text = text.trim();
    if !text.is_empty() {
        return broadcast(bot, msg, deps, Audience::All, Content::Text(text)).await;
    }

    session.set_conversation(Conversation::None);
    bot.send_message(msg.chat.id, "Who should receive the broadcast?")
        .reply_markup(audience_keyboard())
        .await?;
    Ok(())
}

/// Handles `bc:*` buttons.
pub async fn handle_broadcast_callback(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    payload: &str,
    session: &UserBrowseSession,
) -> AppResult<()> {
    if !config::admin::is_owner(session.user_id()) {
        log::warn!("User {} pressed an owner-only broadcast button", session.user_id());
        return Ok(());
    }

    let by_branch = match payload {
        TO_ALL_CALLBACK => {
            let audience = Audience::All;
            bot.edit_message_text(chat_id, message_id, message_prompt(&audience))
                .await?;
            session.set_conversation(Conversation::BroadcastMessage { audience });
            return Ok(());
        }
        TO_YEAR_CALLBACK => false,
        TO_BRANCH_CALLBACK => true,
        other => {
            log::debug!("Unknown broadcast payload '{}'", other);
            return Ok(());
        }
    };

    session.set_conversation(Conversation::BroadcastYear { by_branch });
    bot.edit_message_text(chat_id, message_id, "📣 Broadcast").await?;
    bot.send_message(chat_id, "Which year? Type /cancel to stop.")
        .reply_markup(reply_keyboard(&YEARS))
        .await?;
    Ok(())
}

/// Drives a broadcast conversation with the owner's next message.
pub async fn receive_broadcast_step(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    session: &UserBrowseSession,
    conversation: Conversation,
    text: &str,
) -> AppResult<()> {
    match conversation {
        Conversation::BroadcastYear { by_branch } => {
            let Some(year) = parse_year(text) else {
                bot.send_message(msg.chat.id, "Please select a year from the keyboard.")
                    .reply_markup(reply_keyboard(&YEARS))
                    .await?;
                return Ok(());
            };

            if !by_branch {
                let audience = Audience::Year(year.to_string());
                bot.send_message(msg.chat.id, message_prompt(&audience))
                    .reply_markup(KeyboardRemove::new())
                    .await?;
                session.set_conversation(Conversation::BroadcastMessage { audience });
                return Ok(());
            }

            // Only branches somebody registered with can receive anything
            let counts = run_blocking(&deps.db_pool, move |conn| db::count_by_branch(conn, year)).await?;
            if counts.is_empty() {
                session.set_conversation(Conversation::None);
                bot.send_message(msg.chat.id, format!("No students registered in {}.", year))
                    .reply_markup(KeyboardRemove::new())
                    .await?;
                return Ok(());
            }

            let branches: Vec<String> = counts.into_iter().map(|(branch, _)| branch).collect();
            bot.send_message(msg.chat.id, "Which branch?")
                .reply_markup(reply_keyboard(&branches))
                .await?;
            session.set_conversation(Conversation::BroadcastBranch {
                year: year.to_string(),
                branches,
            });
        }
        Conversation::BroadcastBranch { year, branches } => {
            if !branches.iter().any(|b| b == text) {
                bot.send_message(msg.chat.id, "Please select a branch from the keyboard.")
                    .reply_markup(reply_keyboard(&branches))
                    .await?;
                return Ok(());
            }
            let audience = Audience::Branch {
                year,
                branch: text.to_string(),
            };
            bot.send_message(msg.chat.id, message_prompt(&audience))
                .reply_markup(KeyboardRemove::new())
                .await?;
            session.set_conversation(Conversation::BroadcastMessage { audience });
        }
        Conversation::BroadcastMessage { audience } => {
            session.set_conversation(Conversation::None);
            let content = Content::Copy {
                from: msg.chat.id,
                message: msg.id,
            };
            broadcast(bot, msg, deps, audience, content).await?;
        }
        other => log::debug!("Not a broadcast step: {:?}", other),
    }
    Ok(())
}

/// /getnotes and /getassignments: browse any year and branch.
pub async fn handle_owner_browse_command(
    bot: &Bot,
    msg: &Message,
    session: &UserBrowseSession,
    kind: BrowseKind,
) -> AppResult<()> {
    if !is_owner(msg) {
        bot.send_message(msg.chat.id, OWNER_ONLY).await?;
        return Ok(());
    }

    session.set_conversation(Conversation::OwnerBrowseYear { kind });
    bot.send_message(msg.chat.id, format!("Which year's {}? Type /cancel to stop.", kind))
        .reply_markup(reply_keyboard(&YEARS))
        .await?;
    Ok(())
}

/// Drives /getnotes and /getassignments with the owner's reply.
pub async fn receive_owner_browse_step(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    session: &UserBrowseSession,
    conversation: Conversation,
    text: &str,
) -> AppResult<()> {
    match conversation {
        Conversation::OwnerBrowseYear { kind } => {
            let Some(year) = parse_year(text) else {
                bot.send_message(msg.chat.id, "Please select a year from the keyboard.")
                    .reply_markup(reply_keyboard(&YEARS))
                    .await?;
                return Ok(());
            };

            let branches = match drive_branches(deps, year).await {
                BranchLookup::Found(branches) => branches,
                failure => {
                    session.set_conversation(Conversation::None);
                    let reply = match failure {
                        BranchLookup::NoYearFolder => format!("Could not find folder for '{}'.", year),
                        BranchLookup::NoBranches => format!("No branches found for {}.", year),
                        _ => "Could not connect to Google Drive. Please try again.".to_string(),
                    };
                    bot.send_message(msg.chat.id, reply)
                        .reply_markup(KeyboardRemove::new())
                        .await?;
                    return Ok(());
                }
            };

            bot.send_message(msg.chat.id, "Which branch?")
                .reply_markup(reply_keyboard(&branches))
                .await?;
            session.set_conversation(Conversation::OwnerBrowseBranch {
                kind,
                year: year.to_string(),
                branches,
            });
        }
        Conversation::OwnerBrowseBranch { kind, year, branches } => {
            if !branches.iter().any(|b| b == text) {
                bot.send_message(msg.chat.id, "Please select a branch from the keyboard.")
                    .reply_markup(reply_keyboard(&branches))
                    .await?;
                return Ok(());
            }

            session.set_conversation(Conversation::None);
            bot.send_message(msg.chat.id, format!("📂 {} {}", year, text))
                .reply_markup(KeyboardRemove::new())
                .await?;
            deps.browse
                .start_browse_in(session, ChatRef(msg.chat.id.0), kind, &year, text)
                .await?;
        }
        other => log::debug!("Not an owner browse step: {:?}", other),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_summary() {
        let report = BroadcastReport { delivered: 41, failed: 2 };
        assert_eq!(report.summary(), "📣 Broadcast finished: 41 delivered, 2 failed.");
    }

    #[test]
    fn test_message_prompt_names_audience() {
        let branch = Audience::Branch {
            year: "2nd Year".into(),
            branch: "CSE".into(),
        };
        assert!(message_prompt(&branch).contains("to 2nd Year CSE."));
        assert!(message_prompt(&Audience::All).contains("to all users."));
    }

    #[test]
    fn test_audience_buttons() {
        let keyboard = audience_keyboard();
        assert_eq!(keyboard.inline_keyboard.len(), 3);
        for payload in [TO_ALL_CALLBACK, TO_YEAR_CALLBACK, TO_BRANCH_CALLBACK] {
            assert!(payload.starts_with(BROADCAST_PREFIX));
        }
    }
}
