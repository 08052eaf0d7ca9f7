use serde::{Deserialize, Serialize};

use crate::models::{ConversationId, Message, MessageId, UserId};

/// Events pushed over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatEvent {
    /// A conversation was created between two users
    ConversationStarted {
        conversation_id: ConversationId,
        participants: [UserId; 2],
    },

    /// A message was appended to a conversation
    MessageCreated {
        participants: [UserId; 2],
        message: Message,
    },

    /// Messages were flipped to read by `reader_id`
    MessagesRead {
        conversation_id: ConversationId,
        participants: [UserId; 2],
        reader_id: UserId,
        message_ids: Vec<MessageId>,
    },

    /// The typing indicator changed; `None` means nobody is composing
    TypingChanged {
        conversation_id: ConversationId,
        participants: [UserId; 2],
        typing_user: Option<UserId>,
    },

    /// A conversation was removed
    ConversationDeleted {
        conversation_id: ConversationId,
        participants: [UserId; 2],
    },
}

impl ChatEvent {
    pub fn participants(&self) -> [UserId; 2] {
        match self {
            Self::ConversationStarted { participants, .. }
            | Self::MessageCreated { participants, .. }
            | Self::MessagesRead { participants, .. }
            | Self::TypingChanged { participants, .. }
            | Self::ConversationDeleted { participants, .. } => *participants,
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Self::MessageCreated { message, .. } => message.conversation_id,
            Self::ConversationStarted { conversation_id, .. }
            | Self::MessagesRead { conversation_id, .. }
            | Self::TypingChanged { conversation_id, .. }
            | Self::ConversationDeleted { conversation_id, .. } => *conversation_id,
        }
    }

    /// Whether `user` should receive this event.
    pub fn concerns(&self, user: UserId) -> bool {
        self.participants().contains(&user)
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Bind the connection to a user; events are then scoped to that user's conversations
    Identify { user_id: UserId },
}
