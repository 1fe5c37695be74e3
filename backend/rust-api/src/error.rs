use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Failure kinds surfaced by the quiz workflow. Every variant is terminal for
/// the operation that produced it; nothing here is retried automatically.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QuizError {
    /// Missing credential or other setup problem, detected before any network I/O.
    #[error("{0}")]
    Configuration(String),

    /// The model endpoint could not be reached or answered with an error.
    #[error("Error from API: {0}")]
    Transport(String),

    /// The model answered, but not in the agreed shape.
    #[error("{0}")]
    Format(String),

    /// The request itself is not acceptable in the current session state.
    #[error("{0}")]
    Validation(String),

    #[error("Session not found")]
    SessionNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Transport,
    Format,
    Validation,
    NotFound,
}

impl QuizError {
    pub fn configuration(message: impl Into<String>) -> Self {
        QuizError::Configuration(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        QuizError::Transport(message.into())
    }

    pub fn format(message: impl Into<String>) -> Self {
        QuizError::Format(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        QuizError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            QuizError::Configuration(_) => ErrorKind::Configuration,
            QuizError::Transport(_) => ErrorKind::Transport,
            QuizError::Format(_) => ErrorKind::Format,
            QuizError::Validation(_) => ErrorKind::Validation,
            QuizError::SessionNotFound => ErrorKind::NotFound,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            QuizError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            QuizError::Transport(_) | QuizError::Format(_) => StatusCode::BAD_GATEWAY,
            QuizError::Validation(_) => StatusCode::BAD_REQUEST,
            QuizError::SessionNotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type QuizResult<T> = Result<T, QuizError>;
