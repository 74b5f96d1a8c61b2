//! Shared error types for the services crate.

use thiserror::Error;

use cmi_core::model::{InteractionError, ObjectiveError, StatusError};

/// A failure raised by the host API object itself (the call "threw").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HostFault(pub String);

impl HostFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors emitted by an HACP transport.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("HACP request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("HACP request rejected: {0}")]
    Rejected(String),
}

/// Coarse classification of an [`AdapterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No host, or the LMS did not accept initialisation.
    Connection,
    /// The LMS reported an error code or refused a write.
    HostProtocol,
    /// The caller supplied an out-of-domain value.
    Validation,
    /// The network exchange with an AICC LMS failed.
    Transport,
}

/// Errors emitted by the LMS adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdapterError {
    #[error("LMS API object not available")]
    HostUnavailable,

    #[error("LMS did not report a successful initialisation")]
    InitializeFailed,

    #[error("AICC LMS refused the session (error {code}: {text})")]
    SessionRefused { code: String, text: String },

    #[error("LMS error {code} reading {key}: {description}")]
    Host {
        key: String,
        code: String,
        description: String,
    },

    #[error("unsuccessful attempt to set the value of {key} in the LMS to {value}")]
    SetRejected { key: String, value: String },

    #[error("LMS returned a non-numeric count for {key}: {raw:?}")]
    InvalidCount { key: String, raw: String },

    #[error("{message}")]
    HostCall {
        message: String,
        #[source]
        source: HostFault,
    },

    #[error(transparent)]
    Validation(#[from] cmi_core::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: Box<AdapterError>,
    },
}

impl AdapterError {
    /// Wrap this error under a higher-level message, keeping it as the cause.
    #[must_use]
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Classification of the innermost error, looking through context layers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::HostUnavailable
            | AdapterError::InitializeFailed
            | AdapterError::SessionRefused { .. } => ErrorKind::Connection,
            AdapterError::Host { .. }
            | AdapterError::SetRejected { .. }
            | AdapterError::InvalidCount { .. }
            | AdapterError::HostCall { .. } => ErrorKind::HostProtocol,
            AdapterError::Validation(_) => ErrorKind::Validation,
            AdapterError::Transport(_) => ErrorKind::Transport,
            AdapterError::Context { source, .. } => source.kind(),
        }
    }
}

impl From<StatusError> for AdapterError {
    fn from(err: StatusError) -> Self {
        Self::Validation(err.into())
    }
}

impl From<InteractionError> for AdapterError {
    fn from(err: InteractionError) -> Self {
        Self::Validation(err.into())
    }
}

impl From<ObjectiveError> for AdapterError {
    fn from(err: ObjectiveError) -> Self {
        Self::Validation(err.into())
    }
}
