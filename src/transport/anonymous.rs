//! Plain HTTP credentials.

use super::Credentials;
use crate::error::CredentialError;

/// Credentials for an unauthenticated, unencrypted daemon endpoint.
///
/// The base builder is returned unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnonymousCredentials;

impl Credentials for AnonymousCredentials {
    fn is_tls(&self) -> bool {
        false
    }

    fn configure(
        &self,
        builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder, CredentialError> {
        Ok(builder)
    }
}
