//! Error types for pvectl.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::operation::Operation;

/// Classification of a failed network call, derived from the transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    ConnectTimeout,
    ConnectionRefused,
    NameResolution,
    Timeout,
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkErrorKind::ConnectTimeout => "connect timeout",
            NetworkErrorKind::ConnectionRefused => "connection refused",
            NetworkErrorKind::NameResolution => "name resolution failed",
            NetworkErrorKind::Timeout => "timed out",
            NetworkErrorKind::Other => "network error",
        };
        f.write_str(s)
    }
}

/// Errors produced by the resource operation engine and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Selector clause does not match any known form.
    #[error("invalid selector clause '{0}'")]
    SelectorSyntax(String),

    /// Selector references a field the resource type does not expose.
    #[error("unknown field '{field}' for {resource} selector (supported: {supported})")]
    UnknownField {
        field: String,
        resource: &'static str,
        supported: String,
    },

    /// The request never produced an HTTP response.
    #[error("{kind}: {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    /// The management API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The resource kind has no implementation of this operation.
    #[error("{operation} is not supported for {resource}s")]
    UnsupportedOperation {
        operation: Operation,
        resource: &'static str,
    },

    /// Task reference does not have the expected shape.
    #[error("invalid task reference '{0}'")]
    InvalidTaskRef(String),

    /// Task was still running when the wait ceiling was reached.
    #[error("task {task} still running after {}s", .timeout.as_secs())]
    TaskTimeout { task: String, timeout: Duration },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a network error from a transport failure.
    pub fn from_transport(err: reqwest::Error) -> Self {
        Error::Network {
            kind: classify_transport(&err),
            message: err.to_string(),
        }
    }

    /// Name of the transient failure class, or `None` when the error is not
    /// worth retrying.
    ///
    /// The returned name is safe to log: it never contains request details.
    pub fn transient_class(&self) -> Option<&'static str> {
        match self {
            Error::Network { kind, .. } => match kind {
                NetworkErrorKind::ConnectTimeout => Some("ConnectTimeout"),
                NetworkErrorKind::ConnectionRefused => Some("ConnectionRefused"),
                NetworkErrorKind::NameResolution => Some("NameResolution"),
                NetworkErrorKind::Timeout => Some("Timeout"),
                NetworkErrorKind::Other => None,
            },
            Error::Api { status, .. } => match status {
                429 => Some("RateLimited"),
                502 => Some("BadGateway"),
                503 => Some("ServiceUnavailable"),
                504 => Some("GatewayTimeout"),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether the error stems from invalid user input rather than the cluster.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Error::SelectorSyntax(_) | Error::UnknownField { .. } | Error::Config(_)
        )
    }
}

fn classify_transport(err: &reqwest::Error) -> NetworkErrorKind {
    if err.is_timeout() {
        return if err.is_connect() {
            NetworkErrorKind::ConnectTimeout
        } else {
            NetworkErrorKind::Timeout
        };
    }
    if !err.is_connect() {
        return NetworkErrorKind::Other;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => {
                    return NetworkErrorKind::ConnectionRefused;
                }
                std::io::ErrorKind::TimedOut => return NetworkErrorKind::ConnectTimeout,
                _ => {}
            }
        }
        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return NetworkErrorKind::NameResolution;
        }
        source = cause.source();
    }
    NetworkErrorKind::Other
}

/// Result type for pvectl operations.
pub type Result<T> = std::result::Result<T, Error>;
