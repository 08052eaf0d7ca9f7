use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub u64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const TEMPORARY_PREFIX: &str = "temp-";

/// Message identifier. Stores issue `msg{n}`; clients fabricate `temp-{uuid}`
/// for optimistic messages that have not been confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn issued(seq: u64) -> Self {
        Self(format!("msg{}", seq))
    }

    pub fn temporary() -> Self {
        Self(format!("{}{}", TEMPORARY_PREFIX, Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved identity of a marketplace user, as handed out by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_premium: bool,
}

impl UserProfile {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_verified: false,
            is_premium: false,
        }
    }

    /// Stand-in used when the directory no longer knows a participant.
    pub fn unknown(id: UserId) -> Self {
        Self::new(id, "unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

/// A two-party thread. Messages are kept in chronological (insertion) order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: [UserId; 2],
    pub messages: Vec<Message>,
    pub last_message_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typing_user: Option<UserId>,
}

impl Conversation {
    pub fn new(id: ConversationId, a: UserId, b: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            participants: [a, b],
            messages: Vec::new(),
            last_message_timestamp: now,
            typing_user: None,
        }
    }

    pub fn has_participant(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }

    /// True when this conversation is between exactly `a` and `b`, in either order.
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        self.has_participant(a) && self.has_participant(b)
    }

    /// The counterpart of `user`, or `None` if `user` is not a participant.
    pub fn other_participant(&self, user: UserId) -> Option<UserId> {
        match self.participants {
            [x, y] if x == user => Some(y),
            [x, y] if y == user => Some(x),
            _ => None,
        }
    }

    /// Messages addressed to `user` that `user` has not read.
    pub fn unread_for(&self, user: UserId) -> usize {
        self.messages
            .iter()
            .filter(|m| m.sender_id != user && !m.is_read)
            .count()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_user: UserProfile,
    pub unread_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_user: UserProfile,
}
