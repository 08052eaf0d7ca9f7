use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use harj_chat::{ChatError, ChatResult};
use harj_types::api::{
    ErrorBody, MarkReadRequest, SendMessageRequest, StartConversationRequest, UserQuery,
};
use harj_types::{
    Conversation, ConversationDetail, ConversationId, ConversationSummary, Message, UserId,
};

use crate::backend::ChatBackend;

/// [`ChatBackend`] talking to a running server over its JSON API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn conversations_for_user(&self, user: UserId) -> ChatResult<Vec<ConversationSummary>> {
        let response = self
            .client
            .get(self.url("/conversations"))
            .query(&UserQuery { user_id: user })
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn conversation_by_id(
        &self,
        id: ConversationId,
        user: UserId,
    ) -> ChatResult<Option<ConversationDetail>> {
        let response = self
            .client
            .get(self.url(&format!("/conversations/{}", id)))
            .query(&UserQuery { user_id: user })
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    async fn send_message(
        &self,
        id: ConversationId,
        sender: UserId,
        text: &str,
    ) -> ChatResult<Message> {
        let response = self
            .client
            .post(self.url(&format!("/conversations/{}/messages", id)))
            .json(&SendMessageRequest {
                sender_id: sender,
                text: text.to_string(),
            })
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn mark_read(&self, id: ConversationId, user: UserId) -> ChatResult<()> {
        let response = self
            .client
            .post(self.url(&format!("/conversations/{}/read", id)))
            .json(&MarkReadRequest { user_id: user })
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn unread_count(&self, user: UserId) -> ChatResult<usize> {
        let response = self
            .client
            .get(self.url(&format!("/users/{}/unread-count", user)))
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn start_conversation(&self, a: UserId, b: UserId) -> ChatResult<Conversation> {
        let response = self
            .client
            .post(self.url("/conversations"))
            .json(&StartConversationRequest { user_a: a, user_b: b })
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }
}

fn transport(err: reqwest::Error) -> ChatError {
    debug!("chat backend request failed: {}", err);
    ChatError::Unavailable(format!("network error: {}", err))
}

/// Turn a non-2xx response into the matching [`ChatError`].
async fn check(response: Response) -> ChatResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) => Err(ChatError::from_kind(&err.error, err.message)),
        Err(_) => Err(status_error(status, body)),
    }
}

fn status_error(status: StatusCode, body: String) -> ChatError {
    let message = if body.is_empty() { status.to_string() } else { body };
    match status {
        StatusCode::NOT_FOUND => ChatError::NotFound(message),
        StatusCode::FORBIDDEN => ChatError::Unauthorized(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ChatError::InvalidArgument(message)
        }
        _ => ChatError::Unavailable(message),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ChatResult<T> {
    check(response)
        .await?
        .json::<T>()
        .await
        .map_err(|e| ChatError::Unavailable(format!("failed to parse response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let backend = HttpBackend::new("http://localhost:3000/");
        assert_eq!(backend.url("/conversations"), "http://localhost:3000/conversations");
    }

    #[test]
    fn statuses_map_onto_error_kinds() {
        assert_eq!(status_error(StatusCode::NOT_FOUND, String::new()).kind(), "not_found");
        assert_eq!(status_error(StatusCode::FORBIDDEN, String::new()).kind(), "unauthorized");
        assert_eq!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, "bad json".into()),
            ChatError::InvalidArgument("bad json".into())
        );
        assert_eq!(status_error(StatusCode::BAD_GATEWAY, String::new()).kind(), "unavailable");
    }
}
