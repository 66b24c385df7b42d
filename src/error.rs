//! Error types for the HTTP and deals clients.

use crate::config::ConfigError;
use thiserror::Error;


/// Coarse classification of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation attempted without an active session, or session started twice.
    SessionLifecycle,
    /// The request did not complete or the server answered with a non-success status.
    Transport,
    /// The remote envelope carried an `error` key.
    Application,
    /// The remote reported that the requested record does not exist.
    NotFound,
    /// A payload was missing, malformed or could not be encoded.
    Data,
}

/// Client error types.
#[derive(Debug, Error)]
pub enum Error {
    /// A request was issued before `start()`.
    #[error("HTTP session is not started; call start() or open a session first")]
    NotStarted,

    /// `start()` was called while a session was already active.
    #[error("HTTP session is already started")]
    AlreadyStarted,

    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status and no error envelope.
    #[error("Transport error ({status}): {body}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Remote envelope contained an `error` key.
    #[error("Bitrix24 API error ({status}) {code}: {description}")]
    Api {
        /// HTTP status code of the reply.
        status: u16,
        /// Vendor error code, possibly empty.
        code: String,
        /// Human-readable description.
        description: String,
    },

    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Create call succeeded but produced no usable deal.
    #[error("Deal creation failed: {0}")]
    Creation(String),

    /// Update call reported failure.
    #[error("Deal update failed: {0}")]
    Update(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Header name or value rejected by the HTTP layer.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Query string or form body could not be encoded.
    #[error("Encoding error: {0}")]
    Encode(String),

    /// Success reply whose payload has an unexpected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client configuration rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotStarted | Error::AlreadyStarted => ErrorKind::SessionLifecycle,
            Error::Http(_) | Error::Transport { .. } => ErrorKind::Transport,
            Error::Api { .. } => ErrorKind::Application,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Creation(_)
            | Error::Update(_)
            | Error::Json(_)
            | Error::InvalidUrl(_)
            | Error::InvalidHeader(_)
            | Error::Encode(_)
            | Error::InvalidResponse(_)
            | Error::Config(_) => ErrorKind::Data,
        }
    }

    /// Returns true if the remote reported a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        Error::Encode(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
