use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced at the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("email is required")]
    EmailRequired,
    #[error("code is required")]
    CodeRequired,
    #[error("invalid JSON body")]
    InvalidJson,
    #[error("email is already registered")]
    EmailTaken,
    #[error("invalid form: {0}")]
    BadForm(String),
    #[error("invalid code")]
    InvalidCode,
    #[error("user not found")]
    NotFound,
    #[error("storage error")]
    Storage(#[source] anyhow::Error),
    #[error("io error")]
    Io(#[source] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmailRequired => "email_required",
            Self::CodeRequired => "code_required",
            Self::InvalidJson => "invalid_json",
            Self::EmailTaken => "email_taken",
            Self::BadForm(_) => "bad_form",
            Self::InvalidCode => "invalid_code",
            Self::NotFound => "not_found",
            Self::Storage(_) => "storage_error",
            Self::Io(_) => "io_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::EmailRequired
            | Self::CodeRequired
            | Self::InvalidJson
            | Self::EmailTaken
            | Self::BadForm(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCode => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Storage(ref e) | Self::Io(ref e) = self {
            tracing::error!(error = ?e, kind = self.kind(), "request failed");
        }
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
