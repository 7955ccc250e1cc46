//! /start wizard: year → branch → name
//!
//! Branch choices come from the subfolders of the year folder on Drive, so a
//! completed profile always points at folders that existed at setup time.
//! Replies to the owner conversations are routed from here as well.

use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, KeyboardRemove};

use crate::browse::session::year_folder_name;
use crate::browse::{Conversation, Profile, UserBrowseSession};
use crate::core::AppResult;
use crate::drive::{sort_for_display, ItemKind};
use crate::storage::db::{self, run_blocking};
use crate::telegram::handlers::HandlerDeps;
use crate::telegram::admin::{receive_broadcast_step, receive_owner_browse_step};
use crate::telegram::notice::receive_notice_document;
use crate::telegram::stats::receive_stats_year;
use crate::telegram::Bot;

pub const YEARS: [&str; 4] = ["1st Year", "2nd Year", "3rd Year", "4th Year"];

pub(crate) fn reply_keyboard<S: AsRef<str>>(labels: &[S]) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = labels
        .chunks(2)
        .map(|row| row.iter().map(|label| KeyboardButton::new(label.as_ref())).collect())
        .collect();
    KeyboardMarkup::new(rows).one_time_keyboard().resize_keyboard()
}

/// Matches a reply against the year keyboard, ignoring case and padding.
pub fn parse_year(text: &str) -> Option<&'static str> {
    let wanted = text.trim();
    YEARS.iter().copied().find(|year| year.eq_ignore_ascii_case(wanted))
}

/// /start
pub async fn handle_start_command(bot: &Bot, msg: &Message, session: &UserBrowseSession) -> AppResult<()> {
    if let Some(profile) = session.student_profile() {
        bot.send_message(
            msg.chat.id,
            format!(
                "👋 Welcome back, {}!\n\nUse /notes or /assignments. To change your details, use /reset first.",
                profile.name
            ),
        )
        .await?;
        return Ok(());
    }

    session.set_conversation(Conversation::AwaitingYear);
    bot.send_message(
        msg.chat.id,
        "👋 Welcome! Let's get you set up.\nFirst, please select your academic year.",
    )
    .reply_markup(reply_keyboard(&YEARS))
    .await?;
    Ok(())
}

/// Result of listing the branch folders of a year.
pub(crate) enum BranchLookup {
    Found(Vec<String>),
    NoYearFolder,
    NoBranches,
    Unavailable,
}

/// Branch folder names under the year folder, sorted for display.
pub(crate) async fn drive_branches(deps: &HandlerDeps, year: &str) -> BranchLookup {
    let resolver = deps.browse.resolver();
    let year_folder = match resolver.find_folder(deps.browse.root_id(), &year_folder_name(year)).await {
        Ok(Some(folder)) => folder,
        Ok(None) => return BranchLookup::NoYearFolder,
        Err(e) => {
            log::warn!("Looking up year folder '{}' failed: {}", year, e);
            return BranchLookup::Unavailable;
        }
    };

    match resolver.tree().list_children(&year_folder.id, ItemKind::Folder).await {
        Ok(mut branches) if !branches.is_empty() => {
            sort_for_display(&mut branches);
            BranchLookup::Found(branches.into_iter().map(|b| b.name).collect())
        }
        Ok(_) => BranchLookup::NoBranches,
        Err(e) => {
            log::warn!("Listing branches of '{}' failed: {}", year, e);
            BranchLookup::Unavailable
        }
    }
}

async fn received_year(bot: &Bot, msg: &Message, deps: &HandlerDeps, session: &UserBrowseSession, text: &str) -> AppResult<()> {
    let Some(year) = parse_year(text) else {
        bot.send_message(msg.chat.id, "Please select your year from the keyboard.")
            .reply_markup(reply_keyboard(&YEARS))
            .await?;
        return Ok(());
    };

    bot.send_message(msg.chat.id, "Got it. Fetching available branches...")
        .reply_markup(KeyboardRemove::new())
        .await?;

    let names = match drive_branches(deps, year).await {
        BranchLookup::Found(names) => names,
        failure => {
            session.set_conversation(Conversation::None);
            let text = match failure {
                BranchLookup::NoYearFolder => format!("Could not find folder for '{}'. Please /start again.", year),
                BranchLookup::NoBranches => "No branches found for your year. Please /start again.".to_string(),
                _ => "Could not connect to Google Drive. Please /start again.".to_string(),
            };
            bot.send_message(msg.chat.id, text).await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, "Now, please select your branch.")
        .reply_markup(reply_keyboard(&names))
        .await?;
    session.set_conversation(Conversation::AwaitingBranch {
        year: year.to_string(),
        branches: names,
    });
    Ok(())
}

/// Drives the conversation in progress with a plain (non-command) message.
///
/// Returns `false` if no conversation was waiting for input.
pub async fn handle_conversation_message(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    session: &UserBrowseSession,
) -> AppResult<bool> {
    let text = msg.text().unwrap_or_default().trim().to_string();

    match session.conversation() {
        Conversation::None => return Ok(false),
        Conversation::AwaitingNoticeFile => {
            receive_notice_document(bot, msg, deps, session).await?;
        }
        Conversation::StatsYear => {
            receive_stats_year(bot, msg, deps, session, &text).await?;
        }
        conversation @ (Conversation::BroadcastYear { .. }
        | Conversation::BroadcastBranch { .. }
        | Conversation::BroadcastMessage { .. }) => {
            receive_broadcast_step(bot, msg, deps, session, conversation, &text).await?;
        }
        conversation @ (Conversation::OwnerBrowseYear { .. } | Conversation::OwnerBrowseBranch { .. }) => {
            receive_owner_browse_step(bot, msg, deps, session, conversation, &text).await?;
        }
        Conversation::AwaitingYear => {
            received_year(bot, msg, deps, session, &text).await?;
        }
        Conversation::AwaitingBranch { year, branches } => {
            if !branches.iter().any(|b| *b == text) {
                bot.send_message(msg.chat.id, "Invalid branch. Please select one from the keyboard.")
                    .reply_markup(reply_keyboard(&branches))
                    .await?;
                return Ok(true);
            }
            bot.send_message(
                msg.chat.id,
                format!("Great, you're in {}, {}.\n\nFinally, what's your name?", year, text),
            )
            .reply_markup(KeyboardRemove::new())
            .await?;
            session.set_conversation(Conversation::AwaitingName { year, branch: text });
        }
        Conversation::AwaitingName { year, branch } => {
            if text.is_empty() {
                bot.send_message(msg.chat.id, "Please type your name.").await?;
                return Ok(true);
            }

            let user_id = session.user_id();
            let (db_year, db_branch, db_name) = (year.clone(), branch.clone(), text.clone());
            run_blocking(&deps.db_pool, move |conn| {
                db::upsert_profile(conn, user_id, &db_year, &db_branch, &db_name)
            })
            .await?;

            session.set_profile(Profile {
                year: Some(year),
                branch: Some(branch),
                name: Some(text.clone()),
            });
            session.set_conversation(Conversation::None);
            log::info!("User {} completed setup", user_id);

            bot.send_message(
                msg.chat.id,
                format!("✅ Thanks, {}! Your setup is complete.\n\nType /help to see all commands.", text),
            )
            .await?;
        }
    }

    Ok(true)
}

/// Aborts whatever conversation is in progress. Returns the reply to show.
pub fn cancel_conversation(session: &UserBrowseSession) -> &'static str {
    let previous = session.conversation();
    session.set_conversation(Conversation::None);
    match previous {
        Conversation::None => "Nothing to cancel.",
        Conversation::AwaitingNoticeFile => "Notice posting cancelled.",
        Conversation::AwaitingYear | Conversation::AwaitingBranch { .. } | Conversation::AwaitingName { .. } => {
            "Setup cancelled. Use /start whenever you're ready."
        }
        Conversation::BroadcastYear { .. } | Conversation::BroadcastBranch { .. } | Conversation::BroadcastMessage { .. } => {
            "Broadcast cancelled."
        }
        Conversation::StatsYear | Conversation::OwnerBrowseYear { .. } | Conversation::OwnerBrowseBranch { .. } => {
            "Cancelled."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year(" 2nd year "), Some("2nd Year"));
        assert_eq!(parse_year("5th Year"), None);
    }

    #[test]
    fn test_reply_keyboard_two_per_row() {
        let keyboard = reply_keyboard(&["CSE", "ECE", "ME"]);
        assert_eq!(keyboard.keyboard.len(), 2);
        assert_eq!(keyboard.keyboard[1].len(), 1);
    }

    #[test]
    fn test_cancel_conversation() {
        let session = UserBrowseSession::new(1);
        assert_eq!(cancel_conversation(&session), "Nothing to cancel.");

        session.set_conversation(Conversation::AwaitingNoticeFile);
        assert_eq!(cancel_conversation(&session), "Notice posting cancelled.");

        session.set_conversation(Conversation::AwaitingName {
            year: "1st Year".into(),
            branch: "CSE".into(),
        });
        assert_eq!(cancel_conversation(&session), "Setup cancelled. Use /start whenever you're ready.");
        assert_eq!(session.conversation(), Conversation::None);

        session.set_conversation(Conversation::BroadcastMessage {
            audience: crate::browse::Audience::All,
        });
        assert_eq!(cancel_conversation(&session), "Broadcast cancelled.");

        session.set_conversation(Conversation::OwnerBrowseYear {
            kind: crate::browse::BrowseKind::Notes,
        });
        assert_eq!(cancel_conversation(&session), "Cancelled.");
    }
}
