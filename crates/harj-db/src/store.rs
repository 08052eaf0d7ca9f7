use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{error, warn};

use harj_store::{ConversationStore, StoreError, StoreResult};
use harj_types::{Conversation, ConversationId, Message, MessageId, UserId};

use crate::Database;
use crate::models::{ConversationRow, MessageRow};

/// [`ConversationStore`] persisted in SQLite. The typing indicator is transient
/// and lives in memory only.
pub struct SqliteStore {
    db: Arc<Database>,
    typing: Mutex<HashMap<ConversationId, UserId>>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            typing: Mutex::new(HashMap::new()),
        }
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Run blocking DB work off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                StoreError::Backend(e.to_string())
            })?
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn typing_for(&self, id: ConversationId) -> Option<UserId> {
        match self.typing.lock() {
            Ok(typing) => typing.get(&id).copied(),
            Err(e) => {
                warn!("typing map lock poisoned: {}", e);
                None
            }
        }
    }

    fn assemble(&self, row: ConversationRow, messages: Vec<MessageRow>) -> Conversation {
        let id = ConversationId(row.id as u64);
        Conversation {
            id,
            participants: [UserId(row.participant_a as u64), UserId(row.participant_b as u64)],
            messages: messages.into_iter().map(message_from_row).collect(),
            last_message_timestamp: parse_timestamp(&row.last_message_at, "conversation", &row.id.to_string()),
            typing_user: self.typing_for(id),
        }
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn find_or_create(
        &self,
        a: UserId,
        b: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<(Conversation, bool)> {
        let now = format_timestamp(now);
        let (row, messages, created) = self
            .blocking(move |db| {
                let (row, created) = db.find_or_create_conversation(a.0 as i64, b.0 as i64, &now)?;
                let messages = if created { Vec::new() } else { db.get_messages(row.id)? };
                Ok((row, messages, created))
            })
            .await?;
        Ok((self.assemble(row, messages), created))
    }

    async fn get(&self, id: ConversationId) -> StoreResult<Option<Conversation>> {
        let found = self
            .blocking(move |db| {
                let Some(row) = db.get_conversation(id.0 as i64)? else {
                    return Ok(None);
                };
                let messages = db.get_messages(row.id)?;
                Ok(Some((row, messages)))
            })
            .await?;
        Ok(found.map(|(row, messages)| self.assemble(row, messages)))
    }

    async fn list_for_user(&self, user: UserId) -> StoreResult<Vec<Conversation>> {
        let rows = self
            .blocking(move |db| {
                let mut out = Vec::new();
                for row in db.get_conversations_for_user(user.0 as i64)? {
                    let messages = db.get_messages(row.id)?;
                    out.push((row, messages));
                }
                Ok(out)
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|(row, messages)| self.assemble(row, messages))
            .collect())
    }

    async fn append_message(
        &self,
        id: ConversationId,
        sender: UserId,
        text: String,
        now: DateTime<Utc>,
    ) -> StoreResult<Message> {
        let now = format_timestamp(now);
        let row = self
            .blocking(move |db| db.insert_message(id.0 as i64, sender.0 as i64, &text, &now))
            .await?
            .ok_or(StoreError::ConversationNotFound(id))?;
        Ok(message_from_row(row))
    }

    async fn mark_read_for(
        &self,
        id: ConversationId,
        reader: UserId,
    ) -> StoreResult<Vec<MessageId>> {
        let ids = self
            .blocking(move |db| db.mark_read_for(id.0 as i64, reader.0 as i64))
            .await?;
        Ok(ids.into_iter().map(MessageId).collect())
    }

    async fn mark_message_read(
        &self,
        id: ConversationId,
        message: &MessageId,
    ) -> StoreResult<bool> {
        let message = message.0.clone();
        self.blocking(move |db| db.mark_message_read(id.0 as i64, &message))
            .await
    }

    async fn set_typing(&self, id: ConversationId, user: Option<UserId>) -> StoreResult<()> {
        let exists = self
            .blocking(move |db| Ok(db.get_conversation(id.0 as i64)?.is_some()))
            .await?;
        if !exists {
            return Err(StoreError::ConversationNotFound(id));
        }

        let mut typing = self
            .typing
            .lock()
            .map_err(|e| StoreError::Backend(format!("typing map lock poisoned: {}", e)))?;
        match user {
            Some(user) => typing.insert(id, user),
            None => typing.remove(&id),
        };
        Ok(())
    }

    async fn delete(&self, id: ConversationId) -> StoreResult<bool> {
        let deleted = self
            .blocking(move |db| db.delete_conversation(id.0 as i64))
            .await?;
        if let Ok(mut typing) = self.typing.lock() {
            typing.remove(&id);
        }
        Ok(deleted)
    }
}

/// Fixed-width UTC format so SQLite text ordering matches time ordering.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str, kind: &str, id: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {} '{}': {}", raw, kind, id, e);
            DateTime::default()
        })
}

fn message_from_row(row: MessageRow) -> Message {
    let timestamp = parse_timestamp(&row.created_at, "message", &row.id);
    Message {
        id: MessageId(row.id),
        conversation_id: ConversationId(row.conversation_id as u64),
        sender_id: UserId(row.sender_id as u64),
        text: row.text,
        timestamp,
        is_read: row.is_read,
    }
}
