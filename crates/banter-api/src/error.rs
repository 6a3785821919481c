//! HTTP mapping for store and auth failures.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use banter_db::ChatError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// Missing or invalid token, or bad credentials
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Chat(ChatError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Chat(ChatError::Authorization(_)) => StatusCode::FORBIDDEN,
            Self::Chat(ChatError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Chat(ChatError::AlreadyProcessed | ChatError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Chat(ChatError::Sqlite(_) | ChatError::LockPoisoned) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the log
        let reason = if status.is_server_error() {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            if status == StatusCode::FORBIDDEN {
                warn!("Request denied: {}", self);
            }
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": reason }))).into_response()
    }
}
