//! Unified error system for the Casework core
//!
//! A single error type shared by every layer. Read paths store it as state,
//! mutation paths return it after rollback. Transport rejections are mapped
//! into it exactly once, at the boundary, by [`CaseworkError::from_transport`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::effects::TransportError;

/// Unified error type for all Casework operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CaseworkError {
    /// Invalid input or request rejected as malformed
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Permission denied
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Error message describing the permission issue
        message: String,
    },

    /// A workflow transition the server refused
    #[error("Invalid transition: {message}")]
    InvalidTransition {
        /// Error message describing the refused transition
        message: String,
    },

    /// Non-2xx response that maps to no more specific variant
    #[error("Remote error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Remote {
        /// HTTP status if the transport reported one
        status: Option<u16>,
        /// Human-readable message from the remote
        message: String,
    },

    /// Network or transport error
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// Response body did not match any tolerated shape
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the decoding failure
        message: String,
    },

    /// The request was superseded or its owner went away
    #[error("Request cancelled")]
    Cancelled,

    /// Configuration could not be loaded or failed validation
    #[error("Config error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl CaseworkError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create an invalid transition error
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition {
            message: message.into(),
        }
    }

    /// Create a remote error
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Map a transport rejection into the unified error.
    ///
    /// `fallback` is used verbatim when the transport rejected with something
    /// that carries no usable message, so callers always see a descriptive
    /// error (e.g. "Failed to fetch notes").
    pub fn from_transport(err: TransportError, fallback: &str) -> Self {
        match err {
            TransportError::Aborted => Self::Cancelled,
            TransportError::Status { status, message } => {
                let message = if message.trim().is_empty() {
                    fallback.to_string()
                } else {
                    message
                };
                match status {
                    401 | 403 => Self::permission_denied(message),
                    404 => Self::not_found(message),
                    409 => Self::invalid_transition(message),
                    400 | 422 => Self::invalid(message),
                    _ => Self::remote(Some(status), message),
                }
            }
            TransportError::Network { message } => Self::network(message),
            TransportError::Decode { message } => Self::serialization(message),
            TransportError::Opaque { detail } => match detail {
                Some(detail) if !detail.trim().is_empty() => Self::remote(None, detail),
                _ => Self::remote(None, fallback),
            },
        }
    }

    /// Whether this error only records that a request was superseded.
    ///
    /// Cancellations are never surfaced as user-visible failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Invalid { message }
            | Self::NotFound { message }
            | Self::PermissionDenied { message }
            | Self::InvalidTransition { message }
            | Self::Remote { message, .. }
            | Self::Network { message }
            | Self::Serialization { message }
            | Self::Config { message }
            | Self::Internal { message } => message,
            Self::Cancelled => "Request cancelled",
        }
    }

    /// Classify the error for frontend treatment.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Invalid { .. } | Self::InvalidTransition { .. } => ErrorCategory::Input,
            Self::Config { .. } => ErrorCategory::Config,
            Self::PermissionDenied { .. } => ErrorCategory::Capability,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Network { .. } | Self::Cancelled => ErrorCategory::Network,
            Self::Remote { .. } | Self::Serialization { .. } | Self::Internal { .. } => {
                ErrorCategory::Operation
            }
        }
    }
}

/// Standard Result type for Casework operations
pub type Result<T> = std::result::Result<T, CaseworkError>;

impl From<serde_json::Error> for CaseworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for CaseworkError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

// ============================================================================
// Error Categories
// ============================================================================

/// High-level error categories for frontend error handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// User input or workflow errors (correctable by user)
    Input,
    /// Configuration errors (correctable by modifying settings)
    Config,
    /// Authorization/capability errors
    Capability,
    /// Resource not found errors
    NotFound,
    /// Network connectivity errors (often transient)
    Network,
    /// General operation failures (catch-all)
    Operation,
}

impl ErrorCategory {
    /// Check if this error category is user-correctable.
    #[must_use]
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::Input | Self::Config)
    }

    /// Check if this error category is likely transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::NotFound)
    }

    /// Get a short label for this category.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Config => "Config",
            Self::Capability => "Permission",
            Self::NotFound => "Not Found",
            Self::Network => "Network",
            Self::Operation => "Operation",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
