use thiserror::Error;

use harj_store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Conversation or message id unknown
    #[error("not found: {0}")]
    NotFound(String),

    /// Requester is not a participant
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Empty text, identical participants, unknown user id
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store or transport failed; retrying may succeed
    #[error("unavailable: {0}")]
    Unavailable(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

impl ChatError {
    /// Stable machine-readable name, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Unavailable(_) => "unavailable",
        }
    }

    /// Rebuild an error from its wire kind. Unknown kinds become `Unavailable`.
    pub fn from_kind(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            "not_found" => Self::NotFound(message),
            "unauthorized" => Self::Unauthorized(message),
            "invalid_argument" => Self::InvalidArgument(message),
            _ => Self::Unavailable(message),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(m) | Self::Unauthorized(m) | Self::InvalidArgument(m) | Self::Unavailable(m) => m,
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConversationNotFound(id) => Self::NotFound(format!("conversation {}", id)),
            StoreError::Backend(message) => Self::Unavailable(message),
        }
    }
}
