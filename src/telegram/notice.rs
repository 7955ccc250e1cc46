//! Notices: owners post a document, everyone can fetch the latest one.
//!
//! The document is stored by its Telegram file id, so re-sending it needs no
//! upload and no Drive access.

use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile};

use crate::browse::{Conversation, UserBrowseSession};
use crate::core::config;
use crate::core::AppResult;
use crate::storage::db::{self, run_blocking, Notice};
use crate::telegram::handlers::{sender_id, HandlerDeps};
use crate::telegram::Bot;

pub const OWNER_ONLY: &str = "⛔ This command is only available to the bot owners.";

pub fn notice_caption(notice: &Notice) -> String {
    format!(
        "📢 Latest Notice\n\n📄 File: {}\n🗓️ Posted on: {}",
        notice.file_name,
        notice.posted_at_display()
    )
}

/// /notice
pub async fn handle_notice_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let Some(notice) = run_blocking(&deps.db_pool, db::latest_notice).await? else {
        bot.send_message(msg.chat.id, "There are no notices at the moment.").await?;
        return Ok(());
    };

    bot.send_document(msg.chat.id, InputFile::file_id(FileId(notice.file_id.clone())))
        .caption(notice_caption(&notice))
        .await?;
    Ok(())
}

/// /postnotice: the owner's next document becomes the notice.
pub async fn handle_postnotice_command(bot: &Bot, msg: &Message, session: &UserBrowseSession) -> AppResult<()> {
    if !sender_id(msg).is_some_and(config::admin::is_owner) {
        bot.send_message(msg.chat.id, OWNER_ONLY).await?;
        return Ok(());
    }

    session.set_conversation(Conversation::AwaitingNoticeFile);
    bot.send_message(
        msg.chat.id,
        "Please send the file you want to post as a notice. To cancel, type /cancel.",
    )
    .await?;
    Ok(())
}

/// Handles the message that follows /postnotice.
pub async fn receive_notice_document(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    session: &UserBrowseSession,
) -> AppResult<()> {
    let Some(document) = msg.document() else {
        bot.send_message(msg.chat.id, "That's not a file. Please send a document or type /cancel.")
            .await?;
        return Ok(());
    };

    let notice = Notice {
        file_id: document.file.id.0.clone(),
        file_name: document.file_name.clone().unwrap_or_else(|| "notice".to_string()),
        posted_by: session.user_id(),
        posted_at: msg.date.to_rfc3339(),
    };
    log::info!("User {} posted notice '{}'", notice.posted_by, notice.file_name);

    run_blocking(&deps.db_pool, move |conn| db::save_notice(conn, &notice)).await?;
    session.set_conversation(Conversation::None);

    bot.send_message(msg.chat.id, "✅ Notice has been successfully posted!").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_caption() {
        let notice = Notice {
            file_id: "BQAC".into(),
            file_name: "timetable.pdf".into(),
            posted_by: 1,
            posted_at: "2025-01-09T09:05:00+00:00".into(),
        };
        assert_eq!(
            notice_caption(&notice),
            "📢 Latest Notice\n\n📄 File: timetable.pdf\n🗓️ Posted on: 09 Jan 2025, 09:05 AM"
        );
    }
}
