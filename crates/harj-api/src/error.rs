use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

use harj_chat::ChatError;
use harj_types::api::ErrorBody;

/// A [`ChatError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ChatError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ChatError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            warn!("request failed: {}", self.0);
        }
        let body = ErrorBody {
            error: self.0.kind().to_string(),
            message: self.0.message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
