use async_trait::async_trait;

use harj_chat::{ChatResult, MessagingService};
use harj_types::{
    Conversation, ConversationDetail, ConversationId, ConversationSummary, Message, UserId,
};

/// What a client needs from the messaging service. Implemented in-process by
/// [`MessagingService`] and over the network by [`HttpBackend`](crate::HttpBackend).
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn conversations_for_user(&self, user: UserId) -> ChatResult<Vec<ConversationSummary>>;

    /// `None` when the conversation is gone or `user` is not part of it.
    async fn conversation_by_id(
        &self,
        id: ConversationId,
        user: UserId,
    ) -> ChatResult<Option<ConversationDetail>>;

    async fn send_message(
        &self,
        id: ConversationId,
        sender: UserId,
        text: &str,
    ) -> ChatResult<Message>;

    async fn mark_read(&self, id: ConversationId, user: UserId) -> ChatResult<()>;

    async fn unread_count(&self, user: UserId) -> ChatResult<usize>;

    async fn start_conversation(&self, a: UserId, b: UserId) -> ChatResult<Conversation>;
}

#[async_trait]
impl ChatBackend for MessagingService {
    async fn conversations_for_user(&self, user: UserId) -> ChatResult<Vec<ConversationSummary>> {
        self.get_conversations_for_user(user).await
    }

    async fn conversation_by_id(
        &self,
        id: ConversationId,
        user: UserId,
    ) -> ChatResult<Option<ConversationDetail>> {
        self.get_conversation_by_id(id, user).await
    }

    async fn send_message(
        &self,
        id: ConversationId,
        sender: UserId,
        text: &str,
    ) -> ChatResult<Message> {
        MessagingService::send_message(self, id, sender, text).await
    }

    async fn mark_read(&self, id: ConversationId, user: UserId) -> ChatResult<()> {
        self.mark_conversation_as_read(id, user).await.map(|_| ())
    }

    async fn unread_count(&self, user: UserId) -> ChatResult<usize> {
        self.get_unread_count(user).await
    }

    async fn start_conversation(&self, a: UserId, b: UserId) -> ChatResult<Conversation> {
        MessagingService::start_conversation(self, a, b).await
    }
}
