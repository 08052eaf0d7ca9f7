//! Locally fabricated messages shown before the service has confirmed them.
//!
//! A send moves `Pending -> Confirmed(server id)` or `Pending -> Failed`. A
//! failed send goes back to `Pending` on retry or disappears on discard.
//! [`PendingSends::reconcile`] merges what is left with an authoritative fetch
//! so a message is never shown twice and never silently lost.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};

use harj_types::{Conversation, ConversationId, Message, MessageId, UserId};

use crate::view::{Delivery, ViewMessage};

/// Seconds the service clock may lag the client clock when matching an
/// in-flight send against a fetched message.
const CLOCK_SKEW_ALLOWANCE_SECS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendState {
    Pending,
    Confirmed(MessageId),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub temp_id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub state: SendState,
}

impl PendingSend {
    pub fn new(conversation_id: ConversationId, sender_id: UserId, text: impl Into<String>) -> Self {
        Self {
            temp_id: MessageId::temporary(),
            conversation_id,
            sender_id,
            text: text.into(),
            created_at: Utc::now(),
            state: SendState::Pending,
        }
    }

    /// The message as it would look once stored.
    pub fn as_message(&self) -> Message {
        Message {
            id: self.temp_id.clone(),
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            text: self.text.clone(),
            timestamp: self.created_at,
            is_read: false,
        }
    }

    fn could_be(&self, message: &Message) -> bool {
        message.sender_id == self.sender_id
            && message.text == self.text
            && message.timestamp >= self.created_at - TimeDelta::seconds(CLOCK_SKEW_ALLOWANCE_SECS)
    }
}

#[derive(Debug, Default)]
pub struct PendingSends {
    entries: Vec<PendingSend>,
}

impl PendingSends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, send: PendingSend) {
        self.entries.push(send);
    }

    pub fn get(&self, temp_id: &MessageId) -> Option<&PendingSend> {
        self.entries.iter().find(|e| &e.temp_id == temp_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn confirm(&mut self, temp_id: &MessageId, server_id: MessageId) -> bool {
        self.set_state(temp_id, SendState::Confirmed(server_id))
    }

    pub fn fail(&mut self, temp_id: &MessageId, reason: impl Into<String>) -> bool {
        self.set_state(temp_id, SendState::Failed(reason.into()))
    }

    /// Move a failed send back to pending. Returns a copy to resend, or
    /// `None` if there is no failed send with that id.
    pub fn begin_retry(&mut self, temp_id: &MessageId) -> Option<PendingSend> {
        let entry = self.entries.iter_mut().find(|e| &e.temp_id == temp_id)?;
        if !matches!(entry.state, SendState::Failed(_)) {
            return None;
        }
        entry.state = SendState::Pending;
        entry.created_at = Utc::now();
        Some(entry.clone())
    }

    pub fn discard(&mut self, temp_id: &MessageId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.temp_id != temp_id);
        self.entries.len() != before
    }

    fn set_state(&mut self, temp_id: &MessageId, state: SendState) -> bool {
        match self.entries.iter_mut().find(|e| &e.temp_id == temp_id) {
            Some(entry) => {
                entry.state = state;
                true
            }
            None => false,
        }
    }

    /// Merge local sends of `conversation` with its authoritative messages.
    ///
    /// Confirmed sends whose server id is present are dropped for good.
    /// In-flight sends are hidden while an unclaimed authoritative message
    /// could be them. Failed sends stay visible until retried or discarded.
    pub fn reconcile(&mut self, conversation: &Conversation) -> Vec<ViewMessage> {
        let fetched: HashSet<&MessageId> = conversation.messages.iter().map(|m| &m.id).collect();
        self.entries.retain(|e| {
            e.conversation_id != conversation.id
                || !matches!(&e.state, SendState::Confirmed(id) if fetched.contains(id))
        });

        // Confirmed ids are spoken for even before they show up in a fetch.
        let mut claimed: HashSet<MessageId> = self
            .entries
            .iter()
            .filter_map(|e| match &e.state {
                SendState::Confirmed(id) => Some(id.clone()),
                _ => None,
            })
            .collect();

        let mut merged: Vec<ViewMessage> = conversation
            .messages
            .iter()
            .cloned()
            .map(ViewMessage::delivered)
            .collect();

        for entry in self.entries.iter().filter(|e| e.conversation_id == conversation.id) {
            let delivery = match &entry.state {
                SendState::Failed(reason) => Delivery::Failed(reason.clone()),
                SendState::Confirmed(_) => Delivery::Sending,
                SendState::Pending => {
                    let twin = conversation
                        .messages
                        .iter()
                        .find(|m| !claimed.contains(&m.id) && entry.could_be(m));
                    if let Some(twin) = twin {
                        claimed.insert(twin.id.clone());
                        continue;
                    }
                    Delivery::Sending
                }
            };
            merged.push(ViewMessage {
                message: entry.as_message(),
                delivery,
            });
        }
        merged
    }
}
