use chrono::Utc;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::{
    error::{EvidenceError, Result},
    model::{Chat, DEFAULT_CHAT_TITLE, Message, Role},
};

const TITLE_MAX_CHARS: usize = 40;

/// In-memory conversation state: every chat, and which one is active.
///
/// Chats are never edited in place. Each mutation takes the current chat,
/// builds the next value and swaps it in while holding that chat's entry, so
/// concurrent writers to the same chat are applied one after another.
#[derive(Clone, Default)]
pub struct ConversationStore {
    chats: Arc<DashMap<String, Chat>>,
    active: Arc<Mutex<Option<String>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty chat and make it the active one.
    pub fn create_chat(&self) -> Chat {
        let chat = Chat::new();
        // The active slot is written while the entry is held, so a concurrent
        // delete cannot leave it pointing at a removed chat.
        let _entry = self.chats.entry(chat.id.clone()).insert(chat.clone());
        *self.active_slot() = Some(chat.id.clone());
        debug!("Created chat {}", chat.id);
        chat
    }

    pub fn delete_chat(&self, chat_id: &str) -> Result<Chat> {
        let (_, chat) = self
            .chats
            .remove(chat_id)
            .ok_or_else(|| EvidenceError::ChatNotFound(chat_id.to_string()))?;

        let mut active = self.active_slot();
        if active.as_deref() == Some(chat_id) {
            *active = None;
        }
        Ok(chat)
    }

    pub fn chat(&self, chat_id: &str) -> Option<Chat> {
        self.chats.get(chat_id).map(|entry| entry.clone())
    }

    /// Snapshots of all chats, most recently updated first.
    pub fn chats(&self) -> Vec<Chat> {
        let mut chats: Vec<Chat> = self.chats.iter().map(|entry| entry.clone()).collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        chats
    }

    pub fn message(&self, chat_id: &str, message_id: &str) -> Result<Message> {
        let chat = self
            .chat(chat_id)
            .ok_or_else(|| EvidenceError::ChatNotFound(chat_id.to_string()))?;
        chat.message(message_id)
            .cloned()
            .ok_or_else(|| EvidenceError::message_not_found(chat_id, message_id))
    }

    pub fn active_chat_id(&self) -> Option<String> {
        self.active_slot().clone()
    }

    /// Make `chat_id` the active chat and mark its response as read.
    pub fn set_active(&self, chat_id: &str) -> Result<()> {
        let mut entry = self
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| EvidenceError::ChatNotFound(chat_id.to_string()))?;
        let next = Chat {
            has_unread_response: false,
            ..entry.value().clone()
        };
        *entry = next;
        // Written while the entry is held; see `create_chat`.
        *self.active_slot() = Some(chat_id.to_string());
        Ok(())
    }

    /// Append the user's message and mark the chat as loading.
    ///
    /// Returns the history preceding the new message. Fails with
    /// [`EvidenceError::ChatBusy`] while a previous send is still in flight.
    pub fn begin_send(&self, chat_id: &str, user_message: Message) -> Result<Vec<Message>> {
        let mut history = Vec::new();
        self.replace(chat_id, |chat| {
            if chat.is_loading {
                return Err(EvidenceError::ChatBusy(chat_id.to_string()));
            }

            history = chat.messages.clone();

            let mut next = chat.clone();
            if next.title == DEFAULT_CHAT_TITLE
                && !next.messages.iter().any(|message| message.role == Role::User)
            {
                next.title = derive_title(&user_message.content);
            }
            next.messages.push(user_message);
            next.is_loading = true;
            next.updated_at = Utc::now();
            Ok(next)
        })?;
        Ok(history)
    }

    /// Append the assistant's message and clear the loading flag. The chat is
    /// flagged unread when it is not the active chat at this point.
    pub fn finish_send(&self, chat_id: &str, assistant_message: Message) -> Result<()> {
        let is_active = self.active_chat_id().as_deref() == Some(chat_id);

        self.replace(chat_id, |chat| {
            let mut next = chat.clone();
            next.messages.push(assistant_message);
            next.is_loading = false;
            next.has_unread_response = !is_active;
            next.updated_at = Utc::now();
            Ok(next)
        })?;
        Ok(())
    }

    /// Store the analysis result for one document of one message.
    pub fn record_highlights(
        &self,
        chat_id: &str,
        message_id: &str,
        document_id: &str,
        phrases: Vec<String>,
    ) -> Result<()> {
        self.replace(chat_id, |chat| {
            let position = chat
                .messages
                .iter()
                .position(|message| message.id == message_id)
                .ok_or_else(|| EvidenceError::message_not_found(chat_id, message_id))?;

            let mut next = chat.clone();
            next.messages[position] = chat.messages[position].with_highlights(document_id, phrases);
            Ok(next)
        })?;
        Ok(())
    }

    fn replace<F>(&self, chat_id: &str, build: F) -> Result<Chat>
    where
        F: FnOnce(&Chat) -> Result<Chat>,
    {
        let mut entry = self
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| EvidenceError::ChatNotFound(chat_id.to_string()))?;

        let next = build(entry.value())?;
        *entry = next.clone();
        Ok(next)
    }

    fn active_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn derive_title(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }

    let head: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", head.trim_end())
}
