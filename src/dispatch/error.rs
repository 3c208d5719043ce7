//! Error types for capability dispatch

use thiserror::Error;

use crate::domain::CapabilityKind;

/// Category of a dispatch failure, used by callers to decide propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Capability, client or agent not found. Never retried.
    Configuration,
    /// More than one client could serve the request.
    Ambiguity,
    /// Root-boundary violation.
    AccessDenied,
    /// The client reported a failure or the call timed out.
    Execution,
    /// The session itself failed.
    Transport,
    /// Malformed input to a registry.
    Validation,
}

/// Errors raised by the dispatch facade and its registries
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No client owns the capability
    #[error("{} '{name}' not found{}", kind.label(), if *filtered { " matching filter" } else { "" })]
    NotFound {
        kind: CapabilityKind,
        name: String,
        filtered: bool,
    },

    /// Client id is not connected
    #[error("Client '{0}' not found")]
    ClientNotFound(String),

    /// Client hint excluded by the caller's allow filter
    #[error("Client '{client}' for {kind} '{name}' is not in allowed filter")]
    NotInFilter {
        kind: CapabilityKind,
        name: String,
        client: String,
    },

    /// Capability is excluded for the requesting agent
    #[error("{} '{name}' is excluded for this agent", kind.label())]
    Excluded { kind: CapabilityKind, name: String },

    /// Several clients own the capability
    #[error(
        "{} '{name}' is ambiguous{}: provided by clients [{}]",
        kind.label(),
        if *filtered { " within filter" } else { "" },
        candidates.join(", ")
    )]
    Ambiguous {
        kind: CapabilityKind,
        name: String,
        candidates: Vec<String>,
        filtered: bool,
    },

    /// URI outside the client's declared roots
    #[error("Access denied: client '{client}' may not access '{uri}'")]
    AccessDenied { client: String, uri: String },

    /// Application-level error reported by the client
    #[error("{0}")]
    Execution(String),

    /// Invocation exceeded the client's timeout
    #[error("{} '{name}' on client '{client}' timed out after {timeout_ms}ms", kind.label())]
    Timeout {
        kind: CapabilityKind,
        name: String,
        client: String,
        timeout_ms: u64,
    },

    /// The session failed while invoking
    #[error("transport error for client '{client}': {source}")]
    Transport {
        client: String,
        #[source]
        source: anyhow::Error,
    },

    /// Registry input failed validation
    #[error("Validation error: {0}")]
    Validation(String),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NotFound { .. }
            | DispatchError::ClientNotFound(_)
            | DispatchError::NotInFilter { .. }
            | DispatchError::Excluded { .. } => ErrorKind::Configuration,
            DispatchError::Ambiguous { .. } => ErrorKind::Ambiguity,
            DispatchError::AccessDenied { .. } => ErrorKind::AccessDenied,
            DispatchError::Execution(_) | DispatchError::Timeout { .. } => ErrorKind::Execution,
            DispatchError::Transport { .. } => ErrorKind::Transport,
            DispatchError::Validation(_) => ErrorKind::Validation,
        }
    }
}

impl From<super::roots::RootError> for DispatchError {
    fn from(err: super::roots::RootError) -> Self {
        match err {
            super::roots::RootError::AccessDenied { client, uri } => {
                DispatchError::AccessDenied { client, uri }
            }
            other => DispatchError::Validation(other.to_string()),
        }
    }
}

/// Result type alias for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;
