//! Chat surface that records outgoing calls instead of talking to Telegram

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::browse::{ChatRef, ChatSurface, MenuButton, MessageRef};
use crate::core::{AppError, AppResult};

/// One recorded call, in the order calls were made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Text {
        chat: ChatRef,
        text: String,
    },
    Menu {
        chat: ChatRef,
        message: MessageRef,
        text: String,
        buttons: Vec<MenuButton>,
    },
    EditMenu {
        message: MessageRef,
        text: String,
        buttons: Vec<MenuButton>,
    },
    EditText {
        message: MessageRef,
        text: String,
    },
    Delete {
        message: MessageRef,
    },
    Document {
        chat: ChatRef,
        file_name: String,
        size: usize,
    },
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    events: Mutex<Vec<SurfaceEvent>>,
    documents: Mutex<Vec<(String, Bytes)>>,
    next_message_id: AtomicI32,
    fail_documents: Mutex<HashSet<String>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_message(&self, chat: ChatRef) -> MessageRef {
        MessageRef {
            chat,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    fn record(&self, event: SurfaceEvent) {
        locked(&self.events).push(event);
    }

    /// A message id as if the bot had sent something earlier, without recording it.
    pub fn seed_message(&self, chat: ChatRef) -> MessageRef {
        self.next_message(chat)
    }

    /// Makes `send_document` fail for this file name.
    pub fn fail_documents_named(&self, file_name: &str) {
        locked(&self.fail_documents).insert(file_name.to_string());
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        locked(&self.events).clone()
    }

    pub fn clear(&self) {
        locked(&self.events).clear();
    }

    /// Texts of plain `send_text` calls.
    pub fn texts(&self) -> Vec<String> {
        locked(&self.events)
            .iter()
            .filter_map(|event| match event {
                SurfaceEvent::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Buttons of the most recent menu, sent or edited.
    pub fn last_menu(&self) -> Option<(MessageRef, Vec<MenuButton>)> {
        locked(&self.events).iter().rev().find_map(|event| match event {
            SurfaceEvent::Menu { message, buttons, .. } => Some((*message, buttons.clone())),
            SurfaceEvent::EditMenu { message, buttons, .. } => Some((*message, buttons.clone())),
            _ => None,
        })
    }

    pub fn documents(&self) -> Vec<(String, Bytes)> {
        locked(&self.documents).clone()
    }
}

#[async_trait]
impl ChatSurface for RecordingSurface {
    async fn send_text(&self, chat: ChatRef, text: &str) -> AppResult<MessageRef> {
        self.record(SurfaceEvent::Text {
            chat,
            text: text.to_string(),
        });
        Ok(self.next_message(chat))
    }

    async fn send_menu(&self, chat: ChatRef, text: &str, buttons: &[MenuButton]) -> AppResult<MessageRef> {
        let message = self.next_message(chat);
        self.record(SurfaceEvent::Menu {
            chat,
            message,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(message)
    }

    async fn edit_menu(&self, message: MessageRef, text: &str, buttons: &[MenuButton]) -> AppResult<()> {
        self.record(SurfaceEvent::EditMenu {
            message,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(())
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> AppResult<()> {
        self.record(SurfaceEvent::EditText {
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> AppResult<()> {
        self.record(SurfaceEvent::Delete { message });
        Ok(())
    }

    async fn send_document(&self, chat: ChatRef, file_name: &str, content: Bytes) -> AppResult<MessageRef> {
        if locked(&self.fail_documents).contains(file_name) {
            return Err(AppError::Chat(format!("upload of {} rejected", file_name)));
        }
        self.record(SurfaceEvent::Document {
            chat,
            file_name: file_name.to_string(),
            size: content.len(),
        });
        locked(&self.documents).push((file_name.to_string(), content));
        Ok(self.next_message(chat))
    }
}
