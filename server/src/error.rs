use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use story_core::StoryError;
use thiserror::Error;

/// Shown instead of raw failure details.
const GENERIC_MESSAGE: &str = "Something unexpected happened. Please try again.";

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Generation cancelled")]
    Cancelled,

    /// The request belongs to a story that has since been replaced.
    #[error("Superseded: {0}")]
    Superseded(String),

    #[error("Synthesis error: {message}")]
    Synthesis {
        message: String,
        text: Option<String>,
        /// Story the salvaged text belongs to, so it can still be illustrated.
        story_id: Option<String>,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "validation",
            ApiError::Cancelled => "cancelled",
            ApiError::Superseded(_) => "superseded",
            ApiError::Synthesis { .. } => "synthesis",
            ApiError::Unexpected(_) | ApiError::InternalError(_) => "unexpected",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            // nginx's "client closed request"
            ApiError::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::CONFLICT),
            ApiError::Superseded(_) => StatusCode::CONFLICT,
            ApiError::Synthesis { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Unexpected(_) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoryError> for ApiError {
    fn from(e: StoryError) -> Self {
        match e {
            StoryError::Validation(msg) => ApiError::InvalidInput(msg),
            StoryError::Cancelled => ApiError::Cancelled,
            StoryError::Synthesis { message, text } => ApiError::Synthesis {
                message,
                text,
                story_id: None,
            },
            StoryError::Unexpected(msg) => ApiError::Unexpected(msg),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    story_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let (error_message, text, story_id) = match self {
            ApiError::InvalidInput(msg) => (msg, None, None),
            ApiError::Cancelled => {
                tracing::info!("generation cancelled");
                ("Generation cancelled".to_string(), None, None)
            }
            ApiError::Superseded(msg) => {
                tracing::info!("discarding superseded result: {}", msg);
                (msg, None, None)
            }
            ApiError::Synthesis {
                message,
                text,
                story_id,
            } => {
                tracing::warn!("Synthesis error: {}", message);
                (message, text, story_id)
            }
            ApiError::Unexpected(msg) => {
                tracing::error!("Unexpected error: {}", msg);
                (GENERIC_MESSAGE.to_string(), None, None)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (GENERIC_MESSAGE.to_string(), None, None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: status.as_u16(),
            kind,
            text,
            story_id,
        });

        (status, body).into_response()
    }
}
