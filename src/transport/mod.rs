//! Transport construction from credentials.
//!
//! A client builds exactly one `reqwest::Client` for its lifetime. The
//! [`Credentials`] capability decides how that client reaches the daemon:
//! [`AnonymousCredentials`] for plain HTTP, [`CertificateCredentials`] for
//! mutual TLS. The factory prepares a base builder, hands it to the
//! credential for configuration, and builds the shared client once.

mod anonymous;
mod certificate;

use std::time::Duration;

use tracing::debug;

use crate::error::CredentialError;
use crate::request::USER_AGENT_VALUE;

pub use anonymous::AnonymousCredentials;
pub use certificate::CertificateCredentials;

/// Connection timeout in seconds for container engine API connections.
pub const CONNECTION_TIMEOUT_SECS: u64 = 120;

/// Capability that configures how the transport reaches the daemon.
pub trait Credentials: Send + Sync {
    /// Returns whether these credentials produce a TLS transport.
    fn is_tls(&self) -> bool;

    /// Configure `builder` for these credentials and return it.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` if the credential material cannot be
    /// applied.
    fn configure(
        &self,
        builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder, CredentialError>;
}

/// Options applied to the base builder before credentials configure it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// Maximum time to wait for a TCP/TLS connection to the daemon.
    pub connect_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }
}

/// Build the shared HTTP client for `credentials`.
///
/// No overall request timeout is set on the client: per-call timeouts are
/// composed by the dispatcher so that long-lived streams are not cut off.
///
/// # Errors
///
/// Returns `CredentialError` when the credentials cannot be applied or the
/// client cannot be built.
pub fn build_http_client(
    credentials: &dyn Credentials,
    options: &TransportOptions,
) -> Result<reqwest::Client, CredentialError> {
    let base = reqwest::Client::builder()
        .connect_timeout(options.connect_timeout)
        .user_agent(USER_AGENT_VALUE);

    let client = credentials
        .configure(base)?
        .build()
        .map_err(|e| CredentialError::BuildFailed {
            message: e.to_string(),
        })?;

    debug!(
        tls = credentials.is_tls(),
        connect_timeout_ms = u64::try_from(options.connect_timeout.as_millis()).unwrap_or(u64::MAX),
        "built container engine transport"
    );
    Ok(client)
}
