//! `ChatSurface` over the Telegram Bot API

use async_trait::async_trait;
use bytes::Bytes;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};

use crate::browse::{ChatRef, ChatSurface, MenuButton, MessageRef};
use crate::core::AppResult;
use crate::telegram::Bot;

#[derive(Clone)]
pub struct TelegramSurface {
    bot: Bot,
}

impl TelegramSurface {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// One button per row, in the order given.
pub fn inline_keyboard(buttons: &[MenuButton]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        buttons
            .iter()
            .map(|button| vec![InlineKeyboardButton::callback(button.label.clone(), button.payload.clone())]),
    )
}

fn message_ref(message: &Message) -> MessageRef {
    MessageRef {
        chat: ChatRef(message.chat.id.0),
        message_id: message.id.0,
    }
}

#[async_trait]
impl ChatSurface for TelegramSurface {
    async fn send_text(&self, chat: ChatRef, text: &str) -> AppResult<MessageRef> {
        let sent = self.bot.send_message(ChatId(chat.0), text).await?;
        Ok(message_ref(&sent))
    }

    async fn send_menu(&self, chat: ChatRef, text: &str, buttons: &[MenuButton]) -> AppResult<MessageRef> {
        let sent = self
            .bot
            .send_message(ChatId(chat.0), text)
            .reply_markup(inline_keyboard(buttons))
            .await?;
        Ok(message_ref(&sent))
    }

    async fn edit_menu(&self, message: MessageRef, text: &str, buttons: &[MenuButton]) -> AppResult<()> {
        self.bot
            .edit_message_text(ChatId(message.chat.0), MessageId(message.message_id), text)
            .reply_markup(inline_keyboard(buttons))
            .await?;
        Ok(())
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> AppResult<()> {
        self.bot
            .edit_message_text(ChatId(message.chat.0), MessageId(message.message_id), text)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> AppResult<()> {
        self.bot
            .delete_message(ChatId(message.chat.0), MessageId(message.message_id))
            .await?;
        Ok(())
    }

    async fn send_document(&self, chat: ChatRef, file_name: &str, content: Bytes) -> AppResult<MessageRef> {
        let document = InputFile::memory(content.to_vec()).file_name(file_name.to_string());
        let sent = self.bot.send_document(ChatId(chat.0), document).await?;
        Ok(message_ref(&sent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_keyboard_one_button_per_row() {
        let markup = inline_keyboard(&[MenuButton::new("DSA", "nb:s:1:0"), MenuButton::new("OS", "nb:s:1:1")]);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "OS");
    }
}
