use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type UploadResult<T> = Result<T, UploadError>;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("File exceeds the size limit of {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("Upload session not found")]
    SessionNotFound,

    #[error("Invalid chunk index: {0}")]
    InvalidChunkIndex(String),

    #[error("Incomplete request: {0}")]
    IncompleteRequest(String),

    #[error("Upload incomplete: chunk {missing} is missing")]
    IncompleteUpload { missing: u32 },

    #[error("Staging directory missing")]
    StagingDirectoryMissing,

    #[error("Not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// machine-readable kind reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::InvalidRequest(_) => "InvalidRequest",
            UploadError::FileTooLarge { .. } => "FileTooLarge",
            UploadError::SessionNotFound => "SessionNotFound",
            UploadError::InvalidChunkIndex(_) => "InvalidChunkIndex",
            UploadError::IncompleteRequest(_) => "IncompleteRequest",
            UploadError::IncompleteUpload { .. } | UploadError::StagingDirectoryMissing => {
                "IncompleteUpload"
            }
            UploadError::NotFound => "NotFound",
            UploadError::Io(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::InvalidRequest(_)
            | UploadError::InvalidChunkIndex(_)
            | UploadError::IncompleteRequest(_)
            | UploadError::IncompleteUpload { .. } => StatusCode::BAD_REQUEST,
            UploadError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::SessionNotFound
            | UploadError::StagingDirectoryMissing
            | UploadError::NotFound => StatusCode::NOT_FOUND,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            UploadError::Io(e) => {
                tracing::error!("Internal I/O error: {:?}", e);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "ok": false,
            "kind": self.kind(),
            "error": message,
        }));

        (status, body).into_response()
    }
}
