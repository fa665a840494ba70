//! Remote transport effect
//!
//! The core consumes, but never implements, a JSON-over-HTTP transport. Hosts
//! plug in their own client (browser fetch bridge, reqwest, a mocked backend)
//! by implementing [`TransportEffects`]. Bodies cross the seam as
//! `serde_json::Value`; decoding into domain types happens once, at the
//! boundary, in the synchronizer crate.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::abort::AbortSignal;

/// HTTP verb used by a transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read
    Get,
    /// Create / action
    Post,
    /// Partial update
    Patch,
    /// Remove
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        f.write_str(verb)
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Abort token attached to the request, if any.
    pub signal: Option<AbortSignal>,
}

impl RequestOptions {
    /// Options carrying an abort signal.
    pub fn with_signal(signal: AbortSignal) -> Self {
        Self {
            signal: Some(signal),
        }
    }
}

/// Transport rejection.
///
/// `Aborted` is the named abort condition; every other variant is an ordinary
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request's abort signal fired
    #[error("Request aborted")]
    Aborted,
    /// Non-2xx response
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },
    /// Connection-level failure, including transport-side timeouts
    #[error("Network failure: {message}")]
    Network {
        /// Failure description
        message: String,
    },
    /// Body could not be parsed as JSON
    #[error("Malformed response: {message}")]
    Decode {
        /// Parser message
        message: String,
    },
    /// Rejection that carried no structured error
    #[error("Request rejected")]
    Opaque {
        /// Whatever text the rejection carried
        detail: Option<String>,
    },
}

impl TransportError {
    /// Whether this is the abort condition.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// JSON transport consumed by every synchronizer.
#[async_trait]
pub trait TransportEffects: Send + Sync {
    /// `GET path`
    async fn get(&self, path: &str, options: RequestOptions) -> Result<Value, TransportError>;

    /// `POST path` with an optional JSON body
    async fn post(
        &self,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, TransportError>;

    /// `PATCH path` with an optional JSON body
    async fn patch(
        &self,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, TransportError>;

    /// `DELETE path`
    async fn delete(&self, path: &str, options: RequestOptions) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T> TransportEffects for Arc<T>
where
    T: TransportEffects + ?Sized,
{
    async fn get(&self, path: &str, options: RequestOptions) -> Result<Value, TransportError> {
        (**self).get(path, options).await
    }

    async fn post(
        &self,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, TransportError> {
        (**self).post(path, body, options).await
    }

    async fn patch(
        &self,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, TransportError> {
        (**self).patch(path, body, options).await
    }

    async fn delete(&self, path: &str, options: RequestOptions) -> Result<Value, TransportError> {
        (**self).delete(path, options).await
    }
}
