//! Mutual-TLS credentials backed by a client certificate.
//!
//! The transport presents the client certificate chain, only negotiates
//! TLS 1.2, never consults certificate revocation lists, bypasses any
//! configured proxy and follows at most [`MAX_REDIRECTS`] redirects. Server
//! certificates are checked by a caller-registered verifier when one is set,
//! otherwise by the WebPKI verifier over the configured trust anchors. With
//! no anchors configured the bundled Mozilla root set from `webpki-roots`
//! is used.

use std::fmt;
use std::sync::Arc;

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use rustls::RootCertStore;
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::debug;

use super::Credentials;
use crate::error::CredentialError;

/// Redirect cap applied to TLS transports.
pub const MAX_REDIRECTS: usize = 20;

/// Client-certificate credentials for a TLS-protected daemon endpoint.
pub struct CertificateCredentials {
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    roots: Arc<RootCertStore>,
    server_verifier: Option<Arc<dyn ServerCertVerifier>>,
}

impl fmt::Debug for CertificateCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateCredentials")
            .field("cert_chain_len", &self.cert_chain.len())
            .field("trust_anchors", &self.roots.len())
            .field("custom_verifier", &self.server_verifier.is_some())
            .finish_non_exhaustive()
    }
}

impl CertificateCredentials {
    /// Create credentials from an in-memory certificate chain and key.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::InvalidMaterial` when the chain is empty.
    pub fn new(
        cert_chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, CredentialError> {
        if cert_chain.is_empty() {
            return Err(CredentialError::InvalidMaterial {
                message: String::from("client certificate chain is empty"),
            });
        }
        Ok(Self {
            cert_chain,
            key,
            roots: Arc::new(RootCertStore::empty()),
            server_verifier: None,
        })
    }

    /// Load credentials from PEM files, as laid out by `docker-machine` and
    /// `DOCKER_CERT_PATH` (`cert.pem`, `key.pem`, `ca.pem`).
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::LoadFailed` when a file cannot be read and
    /// `CredentialError::InvalidMaterial` when it holds no usable PEM data.
    pub fn from_pem_files(
        cert_path: &Utf8Path,
        key_path: &Utf8Path,
        ca_path: Option<&Utf8Path>,
    ) -> Result<Self, CredentialError> {
        let cert_pem = read_file(cert_path)?;
        let cert_chain = CertificateDer::pem_slice_iter(&cert_pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid_material(cert_path, &e))?;

        let key_pem = read_file(key_path)?;
        let key =
            PrivateKeyDer::from_pem_slice(&key_pem).map_err(|e| invalid_material(key_path, &e))?;

        let credentials = Self::new(cert_chain, key)?;
        match ca_path {
            Some(path) => {
                let ca_pem = read_file(path)?;
                let anchors = CertificateDer::pem_slice_iter(&ca_pem)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| invalid_material(path, &e))?;
                credentials.with_trust_anchors(anchors)
            }
            None => Ok(credentials),
        }
    }

    /// Add trust anchors used to verify the daemon's certificate.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::InvalidMaterial` if an anchor cannot be
    /// parsed.
    pub fn with_trust_anchors(
        mut self,
        anchors: impl IntoIterator<Item = CertificateDer<'static>>,
    ) -> Result<Self, CredentialError> {
        let mut roots = RootCertStore::clone(&self.roots);
        for anchor in anchors {
            roots
                .add(anchor)
                .map_err(|e| CredentialError::InvalidMaterial {
                    message: format!("unusable trust anchor: {e}"),
                })?;
        }
        self.roots = Arc::new(roots);
        Ok(self)
    }

    /// Register a custom server-certificate verifier.
    ///
    /// It replaces the WebPKI verifier for every connection this transport
    /// makes.
    #[must_use]
    pub fn with_server_verifier(mut self, verifier: Arc<dyn ServerCertVerifier>) -> Self {
        self.server_verifier = Some(verifier);
        self
    }

    /// Return the number of trust anchors configured. Zero means the bundled
    /// roots are used.
    #[must_use]
    pub fn trust_anchor_count(&self) -> usize {
        self.roots.len()
    }

    fn verifier(
        &self,
        provider: &Arc<CryptoProvider>,
    ) -> Result<Arc<dyn ServerCertVerifier>, CredentialError> {
        if let Some(verifier) = &self.server_verifier {
            return Ok(Arc::clone(verifier));
        }
        let roots = if self.roots.is_empty() {
            debug!("no trust anchors configured, using bundled web PKI roots");
            Arc::new(bundled_roots())
        } else {
            Arc::clone(&self.roots)
        };
        let webpki = WebPkiServerVerifier::builder_with_provider(roots, Arc::clone(provider))
            .build()
            .map_err(|e| CredentialError::TlsConfig {
                message: format!("cannot verify daemon certificates: {e}"),
            })?;
        Ok(webpki)
    }

    /// Assemble the rustls client configuration for these credentials.
    fn tls_config(&self) -> Result<rustls::ClientConfig, CredentialError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = self.verifier(&provider)?;

        rustls::ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS12])
            .map_err(|e| tls_error(&e))?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_client_auth_cert(self.cert_chain.clone(), self.key.clone_key())
            .map_err(|e| tls_error(&e))
    }
}

impl Credentials for CertificateCredentials {
    fn is_tls(&self) -> bool {
        true
    }

    fn configure(
        &self,
        builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder, CredentialError> {
        let tls = self.tls_config()?;
        Ok(builder
            .use_preconfigured_tls(tls)
            .no_proxy()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS)))
    }
}

fn bundled_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}

fn tls_error(error: &rustls::Error) -> CredentialError {
    CredentialError::TlsConfig {
        message: error.to_string(),
    }
}

fn invalid_material(path: &Utf8Path, error: &impl fmt::Display) -> CredentialError {
    CredentialError::InvalidMaterial {
        message: format!("{path}: {error}"),
    }
}

/// Read a credential file through capability-oriented filesystem access.
fn read_file(path: &Utf8Path) -> Result<Vec<u8>, CredentialError> {
    let load_failed = |message: String| CredentialError::LoadFailed {
        path: path.as_std_path().to_path_buf(),
        message,
    };
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| load_failed(String::from("path has no file name")))?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|e| load_failed(format!("failed to open directory {parent}: {e}")))?;
    dir.read(file_name).map_err(|e| load_failed(e.to_string()))
}
