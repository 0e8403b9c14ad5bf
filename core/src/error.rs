//! Error types for the records API client.
//!
//! # Design
//! Every failure is classified, never recovered locally. Authentication
//! problems, transport failures, non-success statuses and undecodable bodies
//! each get their own variant so callers can choose a retry policy: a
//! `Transport` error is usually worth retrying, a `Backend` 4xx is not, and a
//! `Decode` error means the server answered but not in the expected shape.

use thiserror::Error;

/// The network call itself failed; no HTTP response was received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport failure: {0}")]
    Other(String),
}

/// An auth strategy could not produce a usable token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The auth endpoint could not be reached.
    #[error("auth endpoint unreachable: {0}")]
    Unreachable(TransportError),

    /// The auth endpoint answered with a non-success status.
    #[error("credentials rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The auth endpoint answered 2xx but without a token.
    #[error("invalid auth response: {0}")]
    InvalidResponse(String),
}

/// Errors returned by `ApiClient` and `Collection` operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("authorization failed: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend returned a non-success status.
    #[error("backend returned status {status}: {body}")]
    Backend { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("can't decode response: {0}")]
    Decode(String),

    /// The request payload could not be serialized to JSON.
    #[error("can't encode request body: {0}")]
    Serialization(String),
}

impl ClientError {
    /// Status code of a `Backend` error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// A filter template referenced a placeholder with no value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("no value for placeholder {{:{0}}}")]
    MissingParam(String),
}
