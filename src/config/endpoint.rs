//! Daemon endpoint resolution.
//!
//! The endpoint comes from configuration first, then from the usual engine
//! environment variables, then from a TCP default. Socket endpoints are
//! rejected because the transport speaks HTTP(S) over TCP only.

use mockable::Env;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ConfigError;
use crate::request::{ApiVersion, Endpoint};

/// Environment variable names checked in fallback order after configuration.
const FALLBACK_ENV_VARS: &[&str] = &["DOCKER_HOST", "CONTAINER_HOST", "PODMAN_HOST"];

/// Environment variable naming the API version to pin.
const API_VERSION_ENV_VAR: &str = "DOCKER_API_VERSION";

/// Endpoint used when neither configuration nor environment names one.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:2375";

/// Classifies endpoint strings by scheme.
enum EndpointScheme {
    /// `tcp://` endpoint, rewritten to HTTP or HTTPS.
    Tcp,
    /// `http://` or `https://` endpoint, used as given.
    Http,
    /// Unix socket or Windows named pipe.
    Socket,
    /// Bare path or unknown scheme.
    Unknown,
}

impl EndpointScheme {
    fn classify(endpoint: &str) -> Self {
        if endpoint.starts_with("tcp://") {
            Self::Tcp
        } else if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            Self::Http
        } else if endpoint.starts_with("unix://") || endpoint.starts_with("npipe://") {
            Self::Socket
        } else {
            Self::Unknown
        }
    }
}

/// Resolves the daemon endpoint from configuration and environment.
///
/// # Type Parameters
///
/// * `E` - An environment provider implementing the `mockable::Env` trait,
///   allowing for testable environment variable access.
pub struct EndpointResolver<'a, E: Env> {
    env: &'a E,
}

impl<'a, E: Env> EndpointResolver<'a, E> {
    /// Creates a new resolver with the given environment provider.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Resolves the endpoint from fallback environment variables.
    ///
    /// Checks `DOCKER_HOST`, `CONTAINER_HOST` and `PODMAN_HOST` in order and
    /// returns the first non-empty value.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        FALLBACK_ENV_VARS
            .iter()
            .filter_map(|var_name| self.env.string(var_name))
            .find(|value| !value.is_empty())
    }

    /// Resolves the endpoint URL as text.
    ///
    /// `configured` wins over the environment, which wins over
    /// [`DEFAULT_ENDPOINT`]. A `tcp://` endpoint becomes `https://` when
    /// `tls` is set and `http://` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsupportedEndpoint` for socket endpoints, bare
    /// paths and unknown schemes.
    pub fn resolve_url(&self, configured: Option<&str>, tls: bool) -> Result<String, ConfigError> {
        let raw = configured
            .filter(|value| !value.is_empty())
            .map(String::from)
            .or_else(|| self.resolve_from_env())
            .unwrap_or_else(|| String::from(DEFAULT_ENDPOINT));

        match EndpointScheme::classify(&raw) {
            EndpointScheme::Http => Ok(raw),
            EndpointScheme::Tcp => {
                let scheme = if tls { "https://" } else { "http://" };
                Ok(raw.replacen("tcp://", scheme, 1))
            }
            EndpointScheme::Socket => Err(ConfigError::UnsupportedEndpoint {
                endpoint: raw,
                reason: String::from("socket endpoints are not reachable over HTTP"),
            }),
            EndpointScheme::Unknown => Err(ConfigError::UnsupportedEndpoint {
                endpoint: raw,
                reason: String::from("expected an http://, https:// or tcp:// endpoint"),
            }),
        }
    }

    /// Resolves the API version from `configured` or `DOCKER_API_VERSION`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when the version is malformed.
    pub fn resolve_api_version(
        &self,
        configured: Option<&str>,
    ) -> Result<Option<ApiVersion>, ConfigError> {
        configured
            .map(String::from)
            .or_else(|| self.env.string(API_VERSION_ENV_VAR))
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.parse())
            .transpose()
    }

    /// Resolves the full endpoint identity for `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL or API version cannot be resolved.
    pub fn resolve(&self, config: &ClientConfig) -> Result<Endpoint, ConfigError> {
        let url = self.resolve_url(config.endpoint.as_deref(), config.tls.is_enabled())?;
        let api_version = self.resolve_api_version(config.api_version.as_deref())?;
        debug!(endpoint = %url, api_version = ?api_version, "resolved container engine endpoint");
        Endpoint::new(&url, api_version)
    }
}
