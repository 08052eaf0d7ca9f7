use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use harj_gateway::Dispatcher;
use harj_store::{ConversationStore, UserDirectory};
use harj_types::events::ChatEvent;
use harj_types::{
    Conversation, ConversationDetail, ConversationId, ConversationSummary, Message, MessageId,
    UserId, UserProfile,
};

use crate::error::{ChatError, ChatResult};
use crate::responder::{CounterpartResponder, ReplyPlan};
use crate::scheduler::ReplyScheduler;

/// The only writer of conversations and messages. Cheap to clone.
#[derive(Clone)]
pub struct MessagingService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    store: Arc<dyn ConversationStore>,
    directory: Arc<dyn UserDirectory>,
    responder: Arc<dyn CounterpartResponder>,
    dispatcher: Dispatcher,
    scheduler: ReplyScheduler,
}

/// A reply that has been planned but not delivered yet.
struct ScheduledReply {
    conversation_id: ConversationId,
    responder_id: UserId,
    trigger_id: MessageId,
    plan: ReplyPlan,
}

impl MessagingService {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        directory: Arc<dyn UserDirectory>,
        responder: Arc<dyn CounterpartResponder>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                store,
                directory,
                responder,
                dispatcher,
                scheduler: ReplyScheduler::new(),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Return the conversation between `a` and `b`, creating it if needed.
    pub async fn start_conversation(&self, a: UserId, b: UserId) -> ChatResult<Conversation> {
        self.open_conversation(a, b).await.map(|(conversation, _)| conversation)
    }

    /// Like [`start_conversation`](Self::start_conversation), also reporting
    /// whether the conversation was created by this call.
    pub async fn open_conversation(
        &self,
        a: UserId,
        b: UserId,
    ) -> ChatResult<(Conversation, bool)> {
        if a == b {
            return Err(ChatError::InvalidArgument(format!(
                "cannot start a conversation between user {} and itself",
                a
            )));
        }
        for user in [a, b] {
            if self.inner.directory.resolve(user).await.is_none() {
                return Err(ChatError::InvalidArgument(format!("unknown user {}", user)));
            }
        }

        let (conversation, created) = self.inner.store.find_or_create(a, b, Utc::now()).await?;
        if created {
            info!("conversation {} started between {} and {}", conversation.id, a, b);
            self.publish(ChatEvent::ConversationStarted {
                conversation_id: conversation.id,
                participants: conversation.participants,
            });
        } else {
            debug!("conversation {} already exists between {} and {}", conversation.id, a, b);
        }
        Ok((conversation, created))
    }

    /// Append a message from `sender` and let the counterpart responder plan
    /// its answer.
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        sender: UserId,
        text: &str,
    ) -> ChatResult<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::InvalidArgument("message text is empty".into()));
        }

        let conversation = self.require(conversation_id).await?;
        if !conversation.has_participant(sender) {
            return Err(ChatError::Unauthorized(format!(
                "user {} is not part of conversation {}",
                sender, conversation_id
            )));
        }

        let message = self
            .inner
            .store
            .append_message(conversation_id, sender, text.to_string(), Utc::now())
            .await?;
        debug!("message {} appended to conversation {}", message.id, conversation_id);
        self.publish(ChatEvent::MessageCreated {
            participants: conversation.participants,
            message: message.clone(),
        });

        self.schedule_reply(&conversation, &message).await;
        Ok(message)
    }

    /// Flip every unread message addressed to `reader`. Absent conversations
    /// and non-participants are a no-op. Returns the flipped ids.
    pub async fn mark_conversation_as_read(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> ChatResult<Vec<MessageId>> {
        let Some(conversation) = self.inner.store.get(conversation_id).await? else {
            debug!("mark-read on missing conversation {}", conversation_id);
            return Ok(Vec::new());
        };
        if !conversation.has_participant(reader) {
            debug!("user {} is not part of conversation {}, ignoring mark-read", reader, conversation_id);
            return Ok(Vec::new());
        }

        let flipped = self.inner.store.mark_read_for(conversation_id, reader).await?;
        if !flipped.is_empty() {
            debug!("user {} read {} messages in conversation {}", reader, flipped.len(), conversation_id);
            self.publish(ChatEvent::MessagesRead {
                conversation_id,
                participants: conversation.participants,
                reader_id: reader,
                message_ids: flipped.clone(),
            });
        }
        Ok(flipped)
    }

    pub async fn get_unread_count(&self, user: UserId) -> ChatResult<usize> {
        let conversations = self.inner.store.list_for_user(user).await?;
        Ok(conversations.iter().map(|c| c.unread_for(user)).sum())
    }

    /// Conversations of `user`, most recently active first.
    pub async fn get_conversations_for_user(
        &self,
        user: UserId,
    ) -> ChatResult<Vec<ConversationSummary>> {
        let conversations = self.inner.store.list_for_user(user).await?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let Some(other) = conversation.other_participant(user) else {
                continue;
            };
            let other_user = self.resolve_or_unknown(other).await;
            let unread_count = conversation.unread_for(user);
            summaries.push(ConversationSummary {
                conversation,
                other_user,
                unread_count,
            });
        }

        summaries.sort_by(|a, b| {
            b.conversation
                .last_message_timestamp
                .cmp(&a.conversation.last_message_timestamp)
                .then(b.conversation.id.cmp(&a.conversation.id))
        });
        Ok(summaries)
    }

    /// The conversation if `user` takes part in it. Non-participants get `None`
    /// exactly as if the id did not exist.
    pub async fn get_conversation_by_id(
        &self,
        conversation_id: ConversationId,
        user: UserId,
    ) -> ChatResult<Option<ConversationDetail>> {
        let Some(conversation) = self.inner.store.get(conversation_id).await? else {
            return Ok(None);
        };
        let Some(other) = conversation.other_participant(user) else {
            debug!("user {} denied access to conversation {}", user, conversation_id);
            return Ok(None);
        };
        let other_user = self.resolve_or_unknown(other).await;
        Ok(Some(ConversationDetail {
            conversation,
            other_user,
        }))
    }

    /// Remove a conversation and cancel any reply still waiting on it.
    pub async fn delete_conversation(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<()> {
        let conversation = self.require(conversation_id).await?;
        if !conversation.has_participant(requester) {
            return Err(ChatError::NotFound(format!("conversation {}", conversation_id)));
        }

        if !self.inner.store.delete(conversation_id).await? {
            return Err(ChatError::NotFound(format!("conversation {}", conversation_id)));
        }
        let cancelled = self.inner.scheduler.cancel(conversation_id);
        info!(
            "conversation {} deleted by user {} ({} pending replies cancelled)",
            conversation_id, requester, cancelled
        );
        self.publish(ChatEvent::ConversationDeleted {
            conversation_id,
            participants: conversation.participants,
        });
        Ok(())
    }

    /// Number of replies still scheduled for a conversation.
    pub fn pending_replies(&self, conversation_id: ConversationId) -> usize {
        self.inner.scheduler.pending(conversation_id)
    }

    /// Cancel every scheduled reply and wait for in-flight reply tasks.
    pub async fn shutdown(&self) {
        info!("messaging service shutting down");
        self.inner.scheduler.shutdown().await;
    }

    async fn require(&self, conversation_id: ConversationId) -> ChatResult<Conversation> {
        self.inner
            .store
            .get(conversation_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("conversation {}", conversation_id)))
    }

    async fn resolve_or_unknown(&self, user: UserId) -> UserProfile {
        match self.inner.directory.resolve(user).await {
            Some(profile) => profile,
            None => {
                warn!("user {} missing from directory", user);
                UserProfile::unknown(user)
            }
        }
    }

    fn publish(&self, event: ChatEvent) {
        self.inner.dispatcher.publish(event);
    }

    async fn schedule_reply(&self, conversation: &Conversation, trigger: &Message) {
        if self.inner.scheduler.is_shut_down() {
            return;
        }
        let Some(plan) = self.inner.responder.plan_reply(conversation, trigger) else {
            return;
        };
        let Some(responder_id) = conversation.other_participant(trigger.sender_id) else {
            return;
        };

        let conversation_id = conversation.id;
        if let Err(e) = self.inner.store.set_typing(conversation_id, Some(responder_id)).await {
            warn!("could not set typing on conversation {}: {}", conversation_id, e);
            return;
        }
        self.publish(ChatEvent::TypingChanged {
            conversation_id,
            participants: conversation.participants,
            typing_user: Some(responder_id),
        });

        debug!(
            "reply from {} scheduled in {:?} for conversation {}",
            responder_id, plan.delay, conversation_id
        );
        let token = self.inner.scheduler.begin(conversation_id);
        let reply = ScheduledReply {
            conversation_id,
            responder_id,
            trigger_id: trigger.id.clone(),
            plan,
        };
        let service = self.clone();
        self.inner.scheduler.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("reply for conversation {} cancelled", reply.conversation_id);
                    service.clear_typing(reply.conversation_id).await;
                }
                _ = tokio::time::sleep(reply.plan.delay) => {
                    if let Err(e) = service.deliver_reply(reply).await {
                        warn!("scheduled reply not delivered: {}", e);
                    }
                }
            }
        });
    }

    async fn deliver_reply(&self, reply: ScheduledReply) -> ChatResult<()> {
        let ScheduledReply {
            conversation_id,
            responder_id,
            trigger_id,
            plan,
        } = reply;

        let none_left = self.inner.scheduler.finish(conversation_id);
        let Some(conversation) = self.inner.store.get(conversation_id).await? else {
            debug!("conversation {} is gone, dropping reply", conversation_id);
            return Ok(());
        };

        if none_left {
            self.inner.store.set_typing(conversation_id, None).await?;
            self.publish(ChatEvent::TypingChanged {
                conversation_id,
                participants: conversation.participants,
                typing_user: None,
            });
        }

        let message = self
            .inner
            .store
            .append_message(conversation_id, responder_id, plan.text, Utc::now())
            .await?;
        debug!("reply {} delivered to conversation {}", message.id, conversation_id);
        self.publish(ChatEvent::MessageCreated {
            participants: conversation.participants,
            message,
        });

        if plan.mark_trigger_read
            && self.inner.store.mark_message_read(conversation_id, &trigger_id).await?
        {
            self.publish(ChatEvent::MessagesRead {
                conversation_id,
                participants: conversation.participants,
                reader_id: responder_id,
                message_ids: vec![trigger_id],
            });
        }
        Ok(())
    }

    /// Clear the typing indicator after a cancellation, unless the
    /// conversation went away or other replies are still waiting.
    async fn clear_typing(&self, conversation_id: ConversationId) {
        if self.inner.scheduler.pending(conversation_id) > 0 {
            return;
        }
        let Ok(Some(conversation)) = self.inner.store.get(conversation_id).await else {
            return;
        };
        if conversation.typing_user.is_none() {
            return;
        }
        if self.inner.store.set_typing(conversation_id, None).await.is_ok() {
            self.publish(ChatEvent::TypingChanged {
                conversation_id,
                participants: conversation.participants,
                typing_user: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::SilentResponder;
    use harj_store::{MemoryDirectory, MemoryStore};

    fn service() -> MessagingService {
        let directory = MemoryDirectory::with_users([
            UserProfile::new(UserId(1), "Alice"),
            UserProfile::new(UserId(2), "Bob"),
            UserProfile::new(UserId(3), "Carol"),
        ]);
        MessagingService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(directory),
            Arc::new(SilentResponder),
            Dispatcher::new(),
        )
    }

    #[tokio::test]
    async fn rejects_self_conversation_and_unknown_users() {
        let service = service();
        assert!(matches!(
            service.start_conversation(UserId(1), UserId(1)).await,
            Err(ChatError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.start_conversation(UserId(1), UserId(42)).await,
            Err(ChatError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn send_validates_text_and_sender() {
        let service = service();
        let conv = service.start_conversation(UserId(1), UserId(2)).await.unwrap();

        assert!(matches!(
            service.send_message(conv.id, UserId(1), "   ").await,
            Err(ChatError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.send_message(conv.id, UserId(3), "hi").await,
            Err(ChatError::Unauthorized(_))
        ));
        assert!(matches!(
            service.send_message(ConversationId(99), UserId(1), "hi").await,
            Err(ChatError::NotFound(_))
        ));

        let message = service.send_message(conv.id, UserId(1), "  hi there ").await.unwrap();
        assert_eq!(message.text, "hi there");
        assert!(!message.is_read);
    }

    #[tokio::test]
    async fn silent_responder_never_sets_typing() {
        let service = service();
        let conv = service.start_conversation(UserId(1), UserId(2)).await.unwrap();
        service.send_message(conv.id, UserId(1), "hi").await.unwrap();
        let detail = service.get_conversation_by_id(conv.id, UserId(1)).await.unwrap().unwrap();
        assert_eq!(detail.conversation.typing_user, None);
        assert_eq!(service.pending_replies(conv.id), 0);
    }

    #[tokio::test]
    async fn mutations_publish_events() {
        let service = service();
        let mut events = service.dispatcher().subscribe();

        let conv = service.start_conversation(UserId(1), UserId(2)).await.unwrap();
        service.send_message(conv.id, UserId(2), "hello").await.unwrap();
        service.mark_conversation_as_read(conv.id, UserId(1)).await.unwrap();
        service.delete_conversation(conv.id, UserId(1)).await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), ChatEvent::ConversationStarted { .. }));
        assert!(matches!(events.recv().await.unwrap(), ChatEvent::MessageCreated { .. }));
        match events.recv().await.unwrap() {
            ChatEvent::MessagesRead { reader_id, message_ids, .. } => {
                assert_eq!(reader_id, UserId(1));
                assert_eq!(message_ids.len(), 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(events.recv().await.unwrap(), ChatEvent::ConversationDeleted { .. }));
    }

    #[tokio::test]
    async fn delete_is_participant_only() {
        let service = service();
        let conv = service.start_conversation(UserId(1), UserId(2)).await.unwrap();
        assert!(matches!(
            service.delete_conversation(conv.id, UserId(3)).await,
            Err(ChatError::NotFound(_))
        ));
        service.delete_conversation(conv.id, UserId(2)).await.unwrap();
        assert!(service.get_conversation_by_id(conv.id, UserId(1)).await.unwrap().is_none());
        assert!(matches!(
            service.delete_conversation(conv.id, UserId(2)).await,
            Err(ChatError::NotFound(_))
        ));
    }
}
