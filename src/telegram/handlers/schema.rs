//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::{
    handle_browse_command, handle_cancel_command, handle_help_command, handle_myinfo_command, handle_reset_command,
};
use super::types::{sender_id, user_id_of, HandlerDeps, HandlerError};
use crate::browse::{BrowseKind, ButtonOutcome, ChatRef, MessageRef};
use crate::core::AppResult;
use crate::telegram::admin::{
    handle_broadcast_callback, handle_broadcast_command, handle_owner_browse_command, BROADCAST_PREFIX,
};
use crate::telegram::bot::Command;
use crate::telegram::leaderboard::{handle_leaderboard_callback, handle_leaderboard_command, CALLBACK_PREFIX};
use crate::telegram::notice::{handle_notice_command, handle_postnotice_command};
use crate::telegram::onboarding::{handle_conversation_message, handle_start_command};
use crate::telegram::stats::{self, handle_stats_callback, handle_stats_command};
use crate::telegram::Bot;

/// Creates the dispatcher schema for the bot.
///
/// The same tree is used for polling and webhook mode.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

async fn dispatch_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, cmd: Command) -> AppResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    deps.remember_user(user).await;
    let session = deps.session_for(user_id_of(user)).await?;

    match cmd {
        Command::Start => handle_start_command(bot, msg, &session).await,
        Command::Help => handle_help_command(bot, msg).await,
        Command::Notes => handle_browse_command(bot, msg, deps, &session, BrowseKind::Notes).await,
        Command::Assignments => handle_browse_command(bot, msg, deps, &session, BrowseKind::Assignments).await,
        Command::Myinfo => handle_myinfo_command(bot, msg, deps, &session).await,
        Command::Reset => handle_reset_command(bot, msg, deps, &session).await,
        Command::Cancel => handle_cancel_command(bot, msg, &session).await,
        Command::Leaderboard => handle_leaderboard_command(bot, msg, deps).await,
        Command::Notice => handle_notice_command(bot, msg, deps).await,
        Command::Postnotice => handle_postnotice_command(bot, msg, &session).await,
        Command::Broadcast(text) => handle_broadcast_command(bot, msg, deps, &session, &text).await,
        Command::Stats => handle_stats_command(bot, msg).await,
        Command::Getnotes => handle_owner_browse_command(bot, msg, &session, BrowseKind::Notes).await,
        Command::Getassignments => handle_owner_browse_command(bot, msg, &session, BrowseKind::Assignments).await,
    }
}

/// Handler for the commands in [`Command`]
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);
                if let Err(e) = dispatch_command(&bot, &msg, &deps, cmd).await {
                    log::error!("Command failed in chat {}: {}", msg.chat.id, e);
                    let _ = bot
                        .send_message(msg.chat.id, "❌ Something went wrong. Please try again.")
                        .await;
                }
                Ok(())
            }
        },
    ))
}

/// Handler for plain messages: onboarding answers and notice uploads
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private() && sender_id(&msg).is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let Some(user_id) = sender_id(&msg) else {
                    return Ok(());
                };
                let session = deps.session_for(user_id).await?;

                match handle_conversation_message(&bot, &msg, &deps, &session).await {
                    Ok(true) => {}
                    Ok(false) => {
                        if session.student_profile().is_none() {
                            bot.send_message(msg.chat.id, "Please use /start to set up your profile.")
                                .await?;
                        } else {
                            bot.send_message(msg.chat.id, "I didn't understand that. Type /help to see all commands.")
                                .await?;
                        }
                    }
                    Err(e) => {
                        log::error!("Conversation step failed for user {}: {}", user_id, e);
                        let _ = bot
                            .send_message(msg.chat.id, "❌ Something went wrong. Please try again.")
                            .await;
                    }
                }
                Ok(())
            }
        })
}

/// Handler for inline button presses
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            // Stops the client-side spinner regardless of what follows
            if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
                log::warn!("Failed to answer callback query: {}", e);
            }

            let Some(message) = q.message.as_ref() else {
                return Ok(());
            };
            let Some(payload) = q.data.as_deref() else {
                return Ok(());
            };
            let chat_id = message.chat().id;

            if payload.starts_with(CALLBACK_PREFIX) {
                if let Err(e) = handle_leaderboard_callback(&bot, chat_id, message.id(), &deps).await {
                    log::error!("Leaderboard refresh failed: {}", e);
                }
                return Ok(());
            }

            let user_id = user_id_of(&q.from);
            let session = deps.session_for(user_id).await?;

            let owner_tool = if payload.starts_with(stats::CALLBACK_PREFIX) {
                Some(handle_stats_callback(&bot, chat_id, message.id(), payload, &deps, &session).await)
            } else if payload.starts_with(BROADCAST_PREFIX) {
                Some(handle_broadcast_callback(&bot, chat_id, message.id(), payload, &session).await)
            } else {
                None
            };
            if let Some(result) = owner_tool {
                if let Err(e) = result {
                    log::error!("Owner button '{}' failed for user {}: {}", payload, user_id, e);
                }
                return Ok(());
            }

            let target = MessageRef {
                chat: ChatRef(chat_id.0),
                message_id: message.id().0,
            };

            match deps.browse.handle_button_press(&session, target, payload).await {
                Ok(ButtonOutcome::Handled) => {}
                Ok(ButtonOutcome::NotMine) => {
                    log::debug!("Ignoring unknown callback payload '{}' from user {}", payload, user_id);
                }
                Err(e) => {
                    log::error!("Button press failed for user {}: {}", user_id, e);
                }
            }
            Ok(())
        }
    })
}
