//! Error types for aqueduct.

use std::sync::Arc;

use bytes::Bytes;
use derive_more::{Display, Error, From};

/// The body shape a decode attempt was aiming for.
///
/// Read errors are classified by this shape so a malformed JSON body under a
/// `json` request is distinguishable from, say, a broken multipart payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BodyShape {
    /// JSON value.
    #[display("json")]
    Json,
    /// UTF-8 text.
    #[display("text")]
    Text,
    /// Opaque binary blob.
    #[display("blob")]
    Blob,
    /// Raw byte buffer.
    #[display("buffer")]
    Buffer,
    /// Multipart form.
    #[display("form")]
    Form,
    /// URL-encoded query pairs.
    #[display("query")]
    Query,
}

/// Why a request was aborted.
///
/// Timeout is a named variant so timeout middleware composes from the same
/// cancellation primitive as every other abort.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum AbortReason {
    /// Aborted without a caller-supplied reason.
    #[display("request canceled")]
    Canceled,
    /// Aborted by timeout middleware.
    #[display("request timed out")]
    Timeout,
    /// Aborted with a caller-supplied message.
    #[display("{_0}")]
    Message(Arc<str>),
}

impl From<&str> for AbortReason {
    fn from(message: &str) -> Self {
        Self::Message(Arc::from(message))
    }
}

impl From<String> for AbortReason {
    fn from(message: String) -> Self {
        Self::Message(Arc::from(message))
    }
}

/// Main error type for aqueduct operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Failed to decode a response body into the attempted shape.
    #[display("failed to read {shape} body: {message}")]
    #[from(skip)]
    ReadBody {
        /// The shape the decode was attempting.
        shape: BodyShape,
        /// The underlying failure.
        message: String,
        /// Raw body bytes, for diagnostics.
        #[error(not(source))]
        raw: Bytes,
    },

    /// The request was aborted.
    #[display("request aborted: {_0}")]
    #[from(skip)]
    Aborted(#[error(not(source))] AbortReason),

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the failing field (e.g. "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// Query string serialization error.
    #[display("query serialization error: {_0}")]
    #[from]
    QuerySerialization(serde_html_form::ser::Error),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a body read error for the given attempted shape.
    #[must_use]
    pub fn read_body(shape: BodyShape, message: impl Into<String>, raw: Bytes) -> Self {
        Self::ReadBody {
            shape,
            message: message.into(),
            raw,
        }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the request was aborted (including timeouts).
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// Returns `true` if the request was aborted by a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Aborted(AbortReason::Timeout))
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// The attempted body shape if this is a read error.
    #[must_use]
    pub const fn read_shape(&self) -> Option<BodyShape> {
        match self {
            Self::ReadBody { shape, .. } => Some(*shape),
            _ => None,
        }
    }

    /// The raw body bytes if this is a read error.
    #[must_use]
    pub const fn raw_body(&self) -> Option<&Bytes> {
        match self {
            Self::ReadBody { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
