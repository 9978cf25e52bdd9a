//! Semantic error types for the dockwire client.
//!
//! This module defines the error hierarchy for dockwire, following the
//! principle of using semantic error enums (via `thiserror`) for conditions
//! the caller might inspect or retry. Argument, cancellation and daemon
//! failures are kept apart so callers can tell "the daemon said no" from
//! "we gave up waiting".

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Error raised by a caller-supplied response handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The daemon endpoint uses a scheme the HTTP transport cannot reach.
    #[error("unsupported daemon endpoint '{endpoint}': {reason}")]
    UnsupportedEndpoint {
        /// The endpoint as resolved from configuration or environment.
        endpoint: String,
        /// Why the endpoint cannot be used.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors that can occur while building the transport from credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A certificate or key file could not be read.
    #[error("failed to load credential material from '{path}': {message}")]
    LoadFailed {
        /// The path to the certificate or key file.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// Certificate or key material was present but unusable.
    #[error("invalid credential material: {message}")]
    InvalidMaterial {
        /// A description of the problem.
        message: String,
    },

    /// The TLS configuration could not be assembled.
    #[error("failed to configure TLS: {message}")]
    TlsConfig {
        /// A description of the TLS failure.
        message: String,
    },

    /// The HTTP client could not be built from the configured handler.
    #[error("failed to build HTTP transport: {message}")]
    BuildFailed {
        /// A description of the build failure.
        message: String,
    },
}

/// Errors raised while assembling an outbound request, before any network
/// activity takes place.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request path was empty.
    #[error("request path must not be empty")]
    MissingPath,

    /// A header name or value could not be encoded.
    #[error("invalid header '{name}': {message}")]
    InvalidHeader {
        /// The offending header name.
        name: String,
        /// A description of the encoding failure.
        message: String,
    },

    /// The endpoint, path and query did not form a valid URI.
    #[error("invalid request URI: {message}")]
    InvalidUri {
        /// A description of the URI failure.
        message: String,
    },

    /// The request content provider failed to produce a body.
    #[error("failed to produce request content: {message}")]
    Content {
        /// A description of the content failure.
        message: String,
    },
}

/// Errors raised while a request is in flight.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The caller's cancellation token fired before the call completed.
    #[error("request was cancelled")]
    Cancelled,

    /// The per-call timeout elapsed before the call completed.
    #[error("request timed out after {} ms", .timeout.as_millis())]
    TimedOut {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The daemon could not be reached.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The transport failed after the connection was established.
    #[error("transport failure: {message}")]
    Transport {
        /// A description of the transport failure.
        message: String,
    },

    /// The response body could not be read.
    #[error("failed to read response body: {message}")]
    BodyRead {
        /// A description of the read failure.
        message: String,
    },
}

impl DispatchError {
    /// Returns whether the call was abandoned by cancellation or timeout
    /// rather than failing in the transport.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut { .. })
    }
}

/// The daemon answered with a status outside the success range and no
/// caller handler claimed the response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("container engine returned {status}{}", body_suffix(.body.as_deref()))]
pub struct DaemonError {
    /// The HTTP status reported by the daemon.
    pub status: StatusCode,
    /// The response body text, when the call buffered it.
    pub body: Option<String>,
}

fn body_suffix(body: Option<&str>) -> String {
    body.filter(|text| !text.is_empty())
        .map(|text| format!(": {text}"))
        .unwrap_or_default()
}

/// Top-level error type for dockwire operations.
///
/// This enum aggregates all domain-specific errors into a single type that
/// operation façades can propagate with `?`.
#[derive(Debug, Error)]
pub enum DockwireError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred while building the transport.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The request could not be assembled.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The request was cancelled, timed out, or failed in flight.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The daemon reported a failure status.
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// A caller-supplied handler recognised the response as a failure.
    #[error("{source}")]
    Handled {
        /// The HTTP status the handler reacted to.
        status: StatusCode,
        /// The handler's error.
        source: HandlerError,
    },
}

impl DockwireError {
    /// Returns the daemon error when the call failed with an unhandled
    /// failure status.
    #[must_use]
    pub const fn as_daemon(&self) -> Option<&DaemonError> {
        match self {
            Self::Daemon(error) => Some(error),
            _ => None,
        }
    }

    /// Returns whether the call was abandoned by cancellation or timeout.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        match self {
            Self::Dispatch(error) => error.is_cancellation(),
            _ => false,
        }
    }
}

/// A specialised `Result` type for dockwire operations.
pub type Result<T> = std::result::Result<T, DockwireError>;
