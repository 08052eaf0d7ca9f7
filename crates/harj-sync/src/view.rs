use std::fmt;

use harj_types::{ConversationDetail, ConversationId, ConversationSummary, Message, MessageId, UserId};

/// Which panes a client should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    List,
    Messages,
    /// Wide layout: list and messages side by side
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Authoritative, as returned by the service
    Delivered,
    /// Optimistic copy still waiting on the service
    Sending,
    Failed(String),
}

/// A message as the client shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewMessage {
    pub message: Message,
    pub delivery: Delivery,
}

impl ViewMessage {
    pub fn delivered(message: Message) -> Self {
        Self {
            message,
            delivery: Delivery::Delivered,
        }
    }

    pub fn is_local(&self) -> bool {
        self.delivery != Delivery::Delivered
    }
}

/// Visible, non-fatal feedback for user-initiated actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SendFailed { temp_id: MessageId, reason: String },
    OpenFailed { conversation_id: ConversationId, reason: String },
    MarkReadFailed { conversation_id: ConversationId, reason: String },
    ConversationGone { conversation_id: ConversationId },
    ContactFailed { user_id: UserId, reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendFailed { reason, .. } => write!(f, "Message not sent: {}", reason),
            Self::OpenFailed { reason, .. } => write!(f, "Could not open conversation: {}", reason),
            Self::MarkReadFailed { reason, .. } => {
                write!(f, "Could not mark conversation as read: {}", reason)
            }
            Self::ConversationGone { .. } => write!(f, "This conversation is no longer available"),
            Self::ContactFailed { reason, .. } => write!(f, "Could not start a conversation: {}", reason),
        }
    }
}

/// Snapshot of everything a chat screen renders.
#[derive(Debug, Clone)]
pub struct ChatView {
    pub user: UserId,
    /// Most recently active first
    pub conversations: Vec<ConversationSummary>,
    pub selected: Option<ConversationId>,
    pub active: Option<ConversationDetail>,
    /// Messages of the active conversation with optimistic sends merged in
    pub messages: Vec<ViewMessage>,
    pub loading: bool,
    pub notices: Vec<Notice>,
    pub viewport_width: u32,
    wide_layout_min_width: u32,
}

impl ChatView {
    pub fn new(user: UserId, viewport_width: u32, wide_layout_min_width: u32) -> Self {
        Self {
            user,
            conversations: Vec::new(),
            selected: None,
            active: None,
            messages: Vec::new(),
            loading: true,
            notices: Vec::new(),
            viewport_width,
            wide_layout_min_width,
        }
    }

    pub fn is_wide(&self) -> bool {
        self.viewport_width >= self.wide_layout_min_width
    }

    pub fn pane(&self) -> Pane {
        if self.is_wide() {
            Pane::Both
        } else if self.selected.is_some() {
            Pane::Messages
        } else {
            Pane::List
        }
    }

    pub fn counterpart_typing(&self) -> bool {
        self.active
            .as_ref()
            .and_then(|a| a.conversation.typing_user)
            .is_some_and(|typing| typing != self.user)
    }

    pub fn total_unread(&self) -> usize {
        self.conversations.iter().map(|s| s.unread_count).sum()
    }

    pub fn summary(&self, id: ConversationId) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|s| s.conversation.id == id)
    }

    pub(crate) fn clear_selection(&mut self) {
        self.selected = None;
        self.active = None;
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pane_follows_width_and_selection() {
        let mut view = ChatView::new(UserId(1), 400, 768);
        assert_eq!(view.pane(), Pane::List);
        view.selected = Some(ConversationId(1));
        assert_eq!(view.pane(), Pane::Messages);
        view.viewport_width = 1024;
        assert_eq!(view.pane(), Pane::Both);
        view.clear_selection();
        assert_eq!(view.pane(), Pane::Both);
    }

    #[test]
    fn notices_read_like_sentences() {
        let notice = Notice::SendFailed {
            temp_id: MessageId::temporary(),
            reason: "network error".into(),
        };
        assert_eq!(notice.to_string(), "Message not sent: network error");
    }
}
