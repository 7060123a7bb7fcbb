use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

// Taken from https://github.com/tokio-rs/axum/blob/main/examples/anyhow-error-response/src/main.rs
#[derive(Debug)]
pub struct BlogError {
    pub status: StatusCode,
    pub message: HttpErrorResponse,
}

#[derive(Debug, Serialize)]
pub struct HttpErrorResponse {
    pub(crate) error: String,
}

impl From<String> for HttpErrorResponse {
    fn from(message: String) -> Self {
        HttpErrorResponse { error: message }
    }
}

impl From<&str> for HttpErrorResponse {
    fn from(message: &str) -> Self {
        HttpErrorResponse {
            error: message.to_string(),
        }
    }
}

impl IntoResponse for BlogError {
    fn into_response(self) -> Response {
        let mut res = Json(self.message).into_response();
        *res.status_mut() = self.status;
        res
    }
}

impl<E> From<E> for BlogError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        BlogError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: HttpErrorResponse::from(err.into().to_string()),
        }
    }
}

impl BlogError {
    pub fn new(status: StatusCode, message: impl Into<HttpErrorResponse>) -> Self {
        BlogError {
            status,
            message: message.into(),
        }
    }
}

pub type BlogResult<T, E = BlogError> = Result<T, E>;

#[macro_export]
macro_rules! bail_blog {
    ($error_message:expr) => {
        return Err($crate::error::BlogError::new(
            ::axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            $error_message,
        ))
    };
    ($status_code:expr, $error_message:expr) => {
        return Err($crate::error::BlogError::new($status_code, $error_message))
    };
    ($status:expr, $fmt:expr $(, $arg:expr)*) => {
        return Err($crate::error::BlogError::new($status, format!($fmt $(, $arg)*)))
    };
}

/// Why a call to the inference endpoint produced no text.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("inference transport error: {0}")]
    Transport(String),

    #[error("inference call timed out after {0} attempt(s)")]
    Timeout(u32),

    #[error("inference endpoint answered {code}: {body}")]
    Status { code: u16, body: String },

    #[error("malformed inference response: {0}")]
    MalformedResponse(String),

    #[error("inference returned no text")]
    EmptyOutput,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("bucket {0} does not exist")]
    BucketNotFound(String),

    #[error("object {0} not found")]
    NotFound(String),

    #[error("invalid object key {0:?}")]
    InvalidKey(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    pub fn status(&self) -> StatusCode {
        match self {
            StorageError::BucketNotFound(_) | StorageError::NotFound(_) => StatusCode::NOT_FOUND,
            StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            StorageError::Io(_) | StorageError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Why a tracked generation request ended in the failed state.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
