use async_trait::async_trait;
use bytes::Bytes;

use crate::core::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatRef(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat: ChatRef,
    pub message_id: i32,
}

/// One inline button: visible label and the callback payload it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuButton {
    pub label: String,
    pub payload: String,
}

impl MenuButton {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// The chat operations the browse flow needs.
///
/// Menus are rendered one button per row. Implemented over teloxide in
/// `telegram::surface`; tests use a recording implementation.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    async fn send_text(&self, chat: ChatRef, text: &str) -> AppResult<MessageRef>;

    async fn send_menu(&self, chat: ChatRef, text: &str, buttons: &[MenuButton]) -> AppResult<MessageRef>;

    /// Replaces text and keyboard of an existing message.
    async fn edit_menu(&self, message: MessageRef, text: &str, buttons: &[MenuButton]) -> AppResult<()>;

    /// Replaces the text of an existing message and removes its keyboard.
    async fn edit_text(&self, message: MessageRef, text: &str) -> AppResult<()>;

    async fn delete_message(&self, message: MessageRef) -> AppResult<()>;

    async fn send_document(&self, chat: ChatRef, file_name: &str, content: Bytes) -> AppResult<MessageRef>;
}
