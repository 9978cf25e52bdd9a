//! Configuration data types for dockwire clients.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CredentialError};
use crate::request::ApiVersion;
use crate::transport::{CONNECTION_TIMEOUT_SECS, CertificateCredentials};

/// Default timeout in seconds for buffered requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 100;

/// Mutual-TLS configuration for reaching a protected daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to the PEM-encoded client certificate chain.
    pub client_cert_path: Option<Utf8PathBuf>,

    /// Path to the PEM-encoded client private key.
    pub client_key_path: Option<Utf8PathBuf>,

    /// Path to PEM-encoded trust anchors for the daemon certificate. When
    /// absent the bundled web PKI roots are used.
    pub ca_cert_path: Option<Utf8PathBuf>,
}

impl TlsConfig {
    /// Returns whether any TLS material is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.client_cert_path.is_some()
            || self.client_key_path.is_some()
            || self.ca_cert_path.is_some()
    }

    /// Validates that the TLS section is either absent or complete.
    ///
    /// A client certificate without its key (or the reverse) is rejected, as
    /// is a CA bundle on its own: the daemon requires a client identity.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` naming the missing fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let mut missing = Vec::new();
        if self.client_cert_path.is_none() {
            missing.push("tls.client_cert_path");
        }
        if self.client_key_path.is_none() {
            missing.push("tls.client_key_path");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingRequired {
                field: missing.join(", "),
            })
        }
    }

    /// Load certificate credentials from the configured files.
    ///
    /// Returns `None` when no TLS material is configured.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` when the section is incomplete or the files
    /// cannot be loaded.
    pub fn credentials(&self) -> Result<Option<CertificateCredentials>, CredentialError> {
        match (&self.client_cert_path, &self.client_key_path) {
            (Some(cert), Some(key)) => {
                CertificateCredentials::from_pem_files(cert, key, self.ca_cert_path.as_deref())
                    .map(Some)
            }
            (None, None) if self.ca_cert_path.is_none() => Ok(None),
            _ => Err(CredentialError::InvalidMaterial {
                message: String::from("TLS requires both a client certificate and a key"),
            }),
        }
    }
}

/// Root client configuration.
///
/// The precedence order (lowest to highest) is: defaults, configuration
/// file, environment variables.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `DOCKWIRE_CONFIG_PATH` environment variable
/// 2. `.dockwire.toml` in the current working directory
/// 3. `.dockwire.toml` in the home directory
/// 4. `~/.config/dockwire/config.toml` (XDG default)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "DOCKWIRE",
    post_merge_hook,
    discovery(
        app_name = "dockwire",
        env_var = "DOCKWIRE_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".dockwire.toml",
        config_cli_long = "config",
        config_cli_visible = false,
    )
)]
pub struct ClientConfig {
    /// The daemon endpoint URL (`http://`, `https://` or `tcp://`).
    pub endpoint: Option<String>,

    /// The REST API version to pin, such as `1.43`.
    pub api_version: Option<String>,

    /// Timeout in seconds for buffered requests. Defaults to 100.
    pub default_timeout_secs: Option<u64>,

    /// Timeout in seconds for establishing a connection. Defaults to 120.
    pub connect_timeout_secs: Option<u64>,

    /// Mutual-TLS configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub tls: TlsConfig,
}

impl ClientConfig {
    /// Returns the timeout applied to buffered requests.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Returns the connection timeout for the transport.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.unwrap_or(CONNECTION_TIMEOUT_SECS))
    }

    /// Parses the configured API version, if any.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when the version is not
    /// `MAJOR.MINOR`.
    pub fn parsed_api_version(&self) -> Result<Option<ApiVersion>, ConfigError> {
        self.api_version.as_deref().map(str::parse).transpose()
    }

    /// Validates the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero timeout or malformed API
    /// version, and `ConfigError::MissingRequired` for an incomplete TLS
    /// section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("default_timeout_secs", self.default_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
        ] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: String::from(field),
                    reason: String::from("timeout must be greater than zero"),
                });
            }
        }
        self.parsed_api_version()?;
        self.tls.validate()
    }
}

impl PostMergeHook for ClientConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        // Blank strings from files or the environment mean "unset".
        if self.endpoint.as_deref().is_some_and(|value| value.trim().is_empty()) {
            self.endpoint = None;
        }
        if self
            .api_version
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            self.api_version = None;
        }
        Ok(())
    }
}
