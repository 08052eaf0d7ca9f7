use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use harj_types::ConversationId;
use harj_types::api::{MarkReadRequest, SendMessageRequest};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .service
        .send_message(conversation_id, req.sender_id, &req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Always 204: marking an unknown conversation read is a no-op.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Json(req): Json<MarkReadRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .mark_conversation_as_read(conversation_id, req.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
