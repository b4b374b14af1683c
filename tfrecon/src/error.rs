//! Error types for tfrecon

use crate::lifecycle::LifecycleState;
use crate::types::AttributePath;
use std::fmt;
use std::time::Duration;

/// Error type for tfrecon operations
#[derive(Debug, thiserror::Error)]
pub enum TfreconError {
    #[error("Invalid configuration: {0}")]
    Validation(Violations),

    #[error("{type_name} {id} not found")]
    NotFound { type_name: String, id: String },

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(
        "Timeout after {elapsed:?} waiting for {operation}; remote changes already \
         made were not rolled back and may need manual intervention"
    )]
    Timeout {
        operation: String,
        elapsed: Duration,
    },

    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<TfreconError>,
    },

    #[error("{type_name} ({}) failed while {state}: {source}", id.as_deref().unwrap_or("<no id>"))]
    Lifecycle {
        type_name: String,
        id: Option<String>,
        state: LifecycleState,
        #[source]
        source: Box<TfreconError>,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("{0}")]
    Custom(String),
}

impl TfreconError {
    pub fn not_found(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        TfreconError::NotFound {
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    /// Throttling and transport failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root_cause(),
            TfreconError::Throttled(_) | TfreconError::Transport(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), TfreconError::NotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), TfreconError::Timeout { .. })
    }

    /// Strips lifecycle annotations and returns the underlying error.
    pub fn root_cause(&self) -> &TfreconError {
        match self {
            TfreconError::Lifecycle { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Configuration violations, if this is a validation failure.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self.root_cause() {
            TfreconError::Validation(v) => Some(&v.0),
            _ => None,
        }
    }
}

/// Result type alias for tfrecon operations
pub type Result<T> = std::result::Result<T, TfreconError>;

impl From<String> for TfreconError {
    fn from(s: String) -> Self {
        TfreconError::Custom(s)
    }
}

impl From<&str> for TfreconError {
    fn from(s: &str) -> Self {
        TfreconError::Custom(s.to_string())
    }
}

impl From<serde_json::Error> for TfreconError {
    fn from(e: serde_json::Error) -> Self {
        TfreconError::DecodingError(e.to_string())
    }
}

/// Category of a configuration problem found before any remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    MissingRequired,
    UnknownAttribute,
    ComputedOnly,
    TypeMismatch,
    InvalidValue,
    BlockCount,
    AtLeastOneOf,
    ExactlyOneOf,
    MutuallyExclusive,
    RequiredWith,
}

/// A single configuration problem
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub path: AttributePath,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, path: AttributePath, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.steps.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Non-empty list of violations carried by [`TfreconError::Validation`]
#[derive(Debug, Clone, PartialEq)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    pub fn contains_kind(&self, kind: ViolationKind) -> bool {
        self.0.iter().any(|v| v.kind == kind)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}
