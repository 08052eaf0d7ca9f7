use axum::{
    Json,
    extract::{Path, State},
};

use harj_types::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// Plain JSON integer.
pub async fn unread_count(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<usize>, ApiError> {
    let count = state.service.get_unread_count(user_id).await?;
    Ok(Json(count))
}
