//! Error types for Meshplane

use thiserror::Error;

/// Result type alias using the Meshplane error
pub type Result<T> = std::result::Result<T, Error>;

/// Semantic classification of an [`Error`], independent of its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    AlreadyExists,
    NotFound,
    PermissionDenied,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "invalid argument"),
            ErrorKind::AlreadyExists => write!(f, "already exists"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::PermissionDenied => write!(f, "permission denied"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Meshplane error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{kind} with ID {id} not found")]
    NotFound { kind: String, id: String },

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Internal(String),

    /// The change was persisted, but connected peers may not have received it yet.
    #[error("{kind} {id} was saved but peers were not updated: {reason}")]
    PeersNotUpdated { kind: String, id: String, reason: String },
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Semantic kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) | Error::Config(_) => ErrorKind::InvalidArgument,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::Io(_)
            | Error::Database(_)
            | Error::Serialization(_)
            | Error::Internal(_)
            | Error::PeersNotUpdated { .. } => ErrorKind::Internal,
        }
    }
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> Self {
        let message = e.to_string();
        match e.kind() {
            ErrorKind::InvalidArgument => tonic::Status::invalid_argument(message),
            ErrorKind::AlreadyExists => tonic::Status::already_exists(message),
            ErrorKind::NotFound => tonic::Status::not_found(message),
            ErrorKind::PermissionDenied => tonic::Status::permission_denied(message),
            ErrorKind::Internal => tonic::Status::internal(message),
        }
    }
}
