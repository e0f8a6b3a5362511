// =============================================================================
// Defo Console - Error Types
// =============================================================================
// Table of Contents:
// 1. Error Classification
// 2. Resource Client Errors
// 3. Store Errors
// =============================================================================

use thiserror::Error;

// -----------------------------------------------------------------------------
// 1. Error Classification
// -----------------------------------------------------------------------------

/// Failure classification shared by the client and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No usable response reached us (unreachable, unparseable).
    Network,
    /// Credential missing, invalid or expired (401).
    Unauthorized,
    /// Client-side precondition failed; never reaches the network.
    Validation,
    /// Rejected by the server (other 4xx).
    ClientError,
    /// Server failure (5xx).
    ServerError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Unauthorized => "unauthorized",
            Self::Validation => "validation",
            Self::ClientError => "client-error",
            Self::ServerError => "server-error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// 2. Resource Client Errors
// -----------------------------------------------------------------------------

/// API error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Deserialization error: {0}")]
    Deserialize(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Request rejected: {status} - {message}")]
    Client { status: u16, message: String },

    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
}

impl ApiError {
    /// Classification used by the store's propagation policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Deserialize(_) => ErrorKind::Network,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Client { .. } => ErrorKind::ClientError,
            Self::Server { .. } => ErrorKind::ServerError,
        }
    }

    /// HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::Network(_) | Self::Deserialize(_) => None,
        }
    }
}

// -----------------------------------------------------------------------------
// 3. Store Errors
// -----------------------------------------------------------------------------

/// Failure returned by every store and dataset operation.
///
/// Carries the original classification plus a message fit for inline display
/// next to the action that triggered it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A client-side precondition failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Wrap a client failure, keeping its classification.
    ///
    /// `action` is the fallback wording, e.g. "Failed to create project".
    pub fn from_api(action: &str, err: &ApiError) -> Self {
        let message = match err {
            ApiError::Client { message, .. } if !message.trim().is_empty() => message.clone(),
            ApiError::Unauthorized => format!("{action}: session expired, please sign in again"),
            other => format!("{action}: {other}"),
        };
        Self::new(err.kind(), message)
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
