pub mod api;
pub mod events;
pub mod models;

pub use models::{
    Conversation, ConversationDetail, ConversationId, ConversationSummary, Message, MessageId,
    UserId, UserProfile,
};
