//! Error types for kgstore.
//!
//! Every public graph operation either succeeds with its documented side
//! effects or fails with exactly one [`Error`] variant. Backend failures are
//! wrapped in [`Error::Store`] together with the collection/key that was being
//! touched.

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for kgstore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// kgstore error types.
#[derive(Error, Debug)]
pub enum Error {
    /// A create operation hit an existing record.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A node, edge, or community required to be present is missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed caller input (bad uid, non-empty adjacency on create, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A stored record does not parse into the expected shape.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Adjacency lists and the edge collection have diverged.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The underlying document store failed.
    #[error("Store error while {context}: {source}")]
    Store {
        /// What the engine was doing (collection and key).
        context: String,
        /// Backend error.
        #[source]
        source: StoreError,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Flat classification of [`Error`] for callers that only match on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::AlreadyExists`].
    AlreadyExists,
    /// See [`Error::NotFound`].
    NotFound,
    /// See [`Error::InvalidArgument`].
    InvalidArgument,
    /// See [`Error::Corrupt`].
    Corrupt,
    /// See [`Error::InvalidState`].
    InvalidState,
    /// See [`Error::Store`].
    Store,
    /// See [`Error::Config`].
    Config,
}

impl Error {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Corrupt(_) => ErrorKind::Corrupt,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Store { .. } => ErrorKind::Store,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Wraps a backend error with operation context.
    pub(crate) fn store(context: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
