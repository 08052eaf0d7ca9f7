use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use harj_types::{Conversation, ConversationId, Message, MessageId, UserId};

use crate::{ConversationStore, StoreError, StoreResult};

/// In-process store. Each instance is fully isolated, so tests build their own.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    conversations: BTreeMap<ConversationId, Conversation>,
    next_conversation_id: u64,
    next_message_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Inner) -> StoreResult<T>,
    {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))?;
        f(&mut inner)
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find_or_create(
        &self,
        a: UserId,
        b: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<(Conversation, bool)> {
        self.with_inner(|inner| {
            if let Some(existing) = inner.conversations.values().find(|c| c.is_between(a, b)) {
                return Ok((existing.clone(), false));
            }

            inner.next_conversation_id += 1;
            let id = ConversationId(inner.next_conversation_id);
            let conversation = Conversation::new(id, a, b, now);
            inner.conversations.insert(id, conversation.clone());
            Ok((conversation, true))
        })
    }

    async fn get(&self, id: ConversationId) -> StoreResult<Option<Conversation>> {
        self.with_inner(|inner| Ok(inner.conversations.get(&id).cloned()))
    }

    async fn list_for_user(&self, user: UserId) -> StoreResult<Vec<Conversation>> {
        self.with_inner(|inner| {
            Ok(inner
                .conversations
                .values()
                .filter(|c| c.has_participant(user))
                .cloned()
                .collect())
        })
    }

    async fn append_message(
        &self,
        id: ConversationId,
        sender: UserId,
        text: String,
        now: DateTime<Utc>,
    ) -> StoreResult<Message> {
        self.with_inner(|inner| {
            let conversation = inner
                .conversations
                .get_mut(&id)
                .ok_or(StoreError::ConversationNotFound(id))?;

            // Wall clocks can step backwards; ordering must not.
            let timestamp = match conversation.last_message() {
                Some(last) if last.timestamp > now => last.timestamp,
                _ => now,
            };

            inner.next_message_id += 1;
            let message = Message {
                id: MessageId::issued(inner.next_message_id),
                conversation_id: id,
                sender_id: sender,
                text,
                timestamp,
                is_read: false,
            };

            conversation.messages.push(message.clone());
            conversation.last_message_timestamp = timestamp;
            Ok(message)
        })
    }

    async fn mark_read_for(
        &self,
        id: ConversationId,
        reader: UserId,
    ) -> StoreResult<Vec<MessageId>> {
        self.with_inner(|inner| {
            let Some(conversation) = inner.conversations.get_mut(&id) else {
                return Ok(Vec::new());
            };

            let mut flipped = Vec::new();
            for message in conversation
                .messages
                .iter_mut()
                .filter(|m| m.sender_id != reader && !m.is_read)
            {
                message.is_read = true;
                flipped.push(message.id.clone());
            }
            Ok(flipped)
        })
    }

    async fn mark_message_read(
        &self,
        id: ConversationId,
        message: &MessageId,
    ) -> StoreResult<bool> {
        self.with_inner(|inner| {
            let target = inner
                .conversations
                .get_mut(&id)
                .and_then(|c| c.messages.iter_mut().find(|m| &m.id == message));

            match target {
                Some(m) if !m.is_read => {
                    m.is_read = true;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    async fn set_typing(&self, id: ConversationId, user: Option<UserId>) -> StoreResult<()> {
        self.with_inner(|inner| {
            let conversation = inner
                .conversations
                .get_mut(&id)
                .ok_or(StoreError::ConversationNotFound(id))?;
            conversation.typing_user = user;
            Ok(())
        })
    }

    async fn delete(&self, id: ConversationId) -> StoreResult<bool> {
        self.with_inner(|inner| Ok(inner.conversations.remove(&id).is_some()))
    }
}
