use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use harj_chat::ChatError;
use harj_types::ConversationId;
use harj_types::api::{StartConversationRequest, UserQuery};

use crate::error::ApiError;
use crate::state::AppState;

/// 201 when the pair had no conversation yet, 200 when the existing one is returned.
pub async fn start_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (conversation, created) = state
        .service
        .open_conversation(req.user_a, req.user_b)
        .await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(conversation)))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summaries = state.service.get_conversations_for_user(query.user_id).await?;
    Ok(Json(summaries))
}

/// Non-participants get the same 404 as for an unknown id.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .service
        .get_conversation_by_id(conversation_id, query.user_id)
        .await?
        .ok_or_else(|| {
            debug!("conversation {} not visible to user {}", conversation_id, query.user_id);
            ChatError::NotFound(format!("conversation {}", conversation_id))
        })?;
    Ok(Json(detail))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Query(query): Query<UserQuery>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_conversation(conversation_id, query.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
