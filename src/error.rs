// src/error.rs
//
// Typed errors for the external collaborator seams.

use thiserror::Error;

/// Failure of a call against a remote API (sheets, mail, drive, token endpoint).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The resource being created already exists (e.g. a label created by a concurrent run).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// No usable access token could be obtained.
    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn is_already_exists(&self) -> bool {
        match self {
            ApiError::AlreadyExists(_) => true,
            ApiError::Http { status, message } => {
                *status == 409 || message.to_lowercase().contains("already exists")
            }
            _ => false,
        }
    }
}

/// Failure while driving the chat form.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("no browser session")]
    NoSession,

    #[error("webdriver error: {0}")]
    WebDriver(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// The sheet does not carry the headers the pipeline relies on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("column '{0}' not found in header row")]
    MissingColumn(String),

    #[error("column '{0}' lies beyond column Z")]
    ColumnOutOfRange(String),
}
