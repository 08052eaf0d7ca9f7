pub mod directory;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use harj_types::{Conversation, ConversationId, Message, MessageId, UserId};

pub use directory::{MemoryDirectory, UserDirectory};
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),

    #[error("store backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owner of all conversations and messages.
///
/// Every method is a single atomic step: implementations must not let two
/// callers interleave inside one call. Composite operations such as
/// [`find_or_create`](Self::find_or_create) exist so callers never need a
/// read-then-write sequence across calls.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the conversation between `a` and `b` (either order), creating it
    /// with `last_message_timestamp = now` if absent. The flag is `true` on create.
    async fn find_or_create(
        &self,
        a: UserId,
        b: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<(Conversation, bool)>;

    async fn get(&self, id: ConversationId) -> StoreResult<Option<Conversation>>;

    /// All conversations `user` participates in, in no particular order.
    async fn list_for_user(&self, user: UserId) -> StoreResult<Vec<Conversation>>;

    /// Appends an unread message and bumps `last_message_timestamp`. The stored
    /// timestamp is never earlier than the previous message's.
    async fn append_message(
        &self,
        id: ConversationId,
        sender: UserId,
        text: String,
        now: DateTime<Utc>,
    ) -> StoreResult<Message>;

    /// Flips every unread message not sent by `reader`; returns the flipped ids.
    /// Unknown conversations yield an empty list.
    async fn mark_read_for(&self, id: ConversationId, reader: UserId)
    -> StoreResult<Vec<MessageId>>;

    /// Flips a single message to read. Returns `false` if it was already read or is unknown.
    async fn mark_message_read(&self, id: ConversationId, message: &MessageId)
    -> StoreResult<bool>;

    async fn set_typing(&self, id: ConversationId, user: Option<UserId>) -> StoreResult<()>;

    /// Removes the conversation and its messages. Returns `false` if it did not exist.
    async fn delete(&self, id: ConversationId) -> StoreResult<bool>;
}
