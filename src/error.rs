//! Error types for OpenSkills

use std::sync::Arc;

use thiserror::Error;

/// Result type alias using OpenSkills' Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for OpenSkills
///
/// `Clone` so a cached body-load failure can be handed to every later caller.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Malformed or missing input, detected before any mutation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No provider is registered for the requested provider type
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Skill is not present in the catalog
    #[error("Skill not found: {0}")]
    SkillNotFound(String),

    /// Skill (or its canonical key) is already present in the catalog
    #[error("Skill already exists: {0}")]
    SkillAlreadyExists(String),

    /// Skill is not active in the session
    #[error("Skill not active: {0}")]
    SkillNotActive(String),

    /// Session is unknown, closed or evicted
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Provider does not support running scripts
    #[error("Run script unsupported: {0}")]
    RunScriptUnsupported(String),

    /// Opaque failure reported by a skill provider
    #[error("Provider error: {0}")]
    Provider(String),

    /// Optimistic-concurrency retry budget exhausted; retry the whole operation
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// The caller's context was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// The caller's deadline passed
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    /// YAML frontmatter error
    #[error("YAML error: {0}")]
    Yaml(Arc<serde_yaml::Error>),

    /// Logic bug; not retryable
    #[error("Internal error: {0}")]
    Internal(String),

    /// Another error with added context. The kind is that of `source`.
    #[error("{context}: {source}")]
    Context {
        /// What was being done
        context: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },
}

/// Classification of an [`Error`] with context layers removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    ProviderNotFound,
    SkillNotFound,
    SkillAlreadyExists,
    SkillNotActive,
    SessionNotFound,
    RunScriptUnsupported,
    Provider,
    ConcurrentModification,
    Cancelled,
    DeadlineExceeded,
    Config,
    Io,
    Serialization,
    Internal,
}

impl Error {
    /// Wrap this error with a context message, keeping its kind
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any context layers
    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Kind of the innermost error
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::ProviderNotFound(_) => ErrorKind::ProviderNotFound,
            Error::SkillNotFound(_) => ErrorKind::SkillNotFound,
            Error::SkillAlreadyExists(_) => ErrorKind::SkillAlreadyExists,
            Error::SkillNotActive(_) => ErrorKind::SkillNotActive,
            Error::SessionNotFound(_) => ErrorKind::SessionNotFound,
            Error::RunScriptUnsupported(_) => ErrorKind::RunScriptUnsupported,
            Error::Provider(_) => ErrorKind::Provider,
            Error::ConcurrentModification(_) => ErrorKind::ConcurrentModification,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) | Error::Yaml(_) => ErrorKind::Serialization,
            Error::Internal(_) | Error::Context { .. } => ErrorKind::Internal,
        }
    }

    /// Cancellation and deadline errors are never cached
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Cancelled | ErrorKind::DeadlineExceeded
        )
    }

    /// Check if the whole operation may simply be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::ConcurrentModification)
    }

    /// Check if error is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidArgument
                | ErrorKind::ProviderNotFound
                | ErrorKind::SkillNotFound
                | ErrorKind::SkillAlreadyExists
                | ErrorKind::SkillNotActive
                | ErrorKind::SessionNotFound
                | ErrorKind::RunScriptUnsupported
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(Arc::new(err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(Arc::new(err))
    }
}
