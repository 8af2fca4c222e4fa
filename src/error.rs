use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored data is malformed: {0}")]
    CorruptStore(String),

    #[error("failed to serialize stored data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("no post found for slug `{0}`")]
    NotFound(String),

    #[error("비밀번호가 올바르지 않습니다.")]
    Gate,

    #[error("site content error: {0}")]
    Content(String),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl BlogError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gate => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BlogError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            htmlescape::encode_minimal(&self.to_string())
        };
        (status, Html(format!("<h1>{}</h1><p>{}</p>", status, message))).into_response()
    }
}

pub type BlogResult<T> = Result<T, BlogError>;
