//! Container engine client and its dispatch primitives.
//!
//! An [`EngineClient`] owns the endpoint identity, the default timeout and
//! one shared transport for its whole lifetime. Every call builds a request,
//! composes the caller's cancellation token with a timeout, dispatches,
//! classifies the status and hands back one of three response shapes.
//!
//! Buffered calls default to the client's timeout (100 seconds unless
//! configured). Stream calls default to no timeout so that long-lived reads
//! such as event or log streams are only ended by the caller.

mod dispatch;
mod error_classification;


use std::sync::Arc;
use std::time::Duration;

use mockable::{DefaultEnv, Env};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cancellation::{CancellationScope, Timeout, compose};
use crate::config::{ClientConfig, DEFAULT_TIMEOUT_SECS, EndpointResolver};
use crate::error::Result;
use crate::request::{ApiRequest, Endpoint, RequestBuilder};
use crate::response::{ApiResponse, BodyStream, HandlerChain, StreamedResponse, classify};
use crate::transport::{
    AnonymousCredentials, Credentials, TransportOptions, build_http_client,
};

pub use dispatch::{Completion, CompletionMode, Dispatcher, ExecuteFuture, HttpTransport};

/// Timeout in seconds for health check operations.
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

/// Path pinged by [`EngineClient::health_check`].
const PING_PATH: &str = "_ping";

/// Client for a container engine REST API.
///
/// Calls take `&self` and may run concurrently; they share the transport
/// but no other state.
#[derive(Debug)]
pub struct EngineClient {
    builder: RequestBuilder,
    dispatcher: Dispatcher,
    default_timeout: Duration,
}

impl EngineClient {
    /// Create a client that reaches `endpoint` with `credentials`.
    ///
    /// The transport is built once here and shared by every call.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` (wrapped in `DockwireError`) when the
    /// transport cannot be built.
    pub fn new(
        endpoint: Endpoint,
        credentials: &dyn Credentials,
        options: &TransportOptions,
    ) -> Result<Self> {
        let client = build_http_client(credentials, options)?;
        Ok(Self::with_transport(endpoint, Arc::new(client)))
    }

    /// Create a client over an existing transport.
    #[must_use]
    pub const fn with_transport(endpoint: Endpoint, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            builder: RequestBuilder::new(endpoint),
            dispatcher: Dispatcher::new(transport),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Open a client from configuration, resolving the endpoint against the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns `DockwireError` when the configuration is invalid, the
    /// endpoint cannot be resolved, or the transport cannot be built.
    pub fn open(config: &ClientConfig) -> Result<Self> {
        Self::open_with_env(config, &DefaultEnv::new())
    }

    /// Open a client from configuration, reading fallbacks through `env`.
    ///
    /// # Errors
    ///
    /// See [`EngineClient::open`].
    pub fn open_with_env<E: Env>(config: &ClientConfig, env: &E) -> Result<Self> {
        config.validate()?;
        let endpoint = EndpointResolver::new(env).resolve(config)?;
        let options = TransportOptions {
            connect_timeout: config.connect_timeout(),
        };

        let mut client = match config.tls.credentials()? {
            Some(credentials) => Self::new(endpoint, &credentials, &options)?,
            None => Self::new(endpoint, &AnonymousCredentials, &options)?,
        };
        client.set_default_timeout(config.default_timeout());
        debug!(endpoint = %client.endpoint().base(), "opened container engine client");
        Ok(client)
    }

    /// Open a client and verify the daemon answers a ping.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`EngineClient::open`] and
    /// [`EngineClient::health_check`].
    pub async fn open_and_verify(config: &ClientConfig) -> Result<Self> {
        let client = Self::open(config)?;
        client.health_check().await?;
        Ok(client)
    }

    /// Release the transport.
    ///
    /// Streams handed out earlier keep their own connections until dropped.
    pub fn close(self) {
        debug!(endpoint = %self.endpoint().base(), "closed container engine client");
    }

    /// Returns the endpoint this client talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        self.builder.endpoint()
    }

    /// Returns the timeout applied to buffered calls without an override.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Change the timeout applied to buffered calls without an override.
    pub const fn set_default_timeout(&mut self, timeout: Duration) {
        self.default_timeout = timeout;
    }

    /// Perform a buffered call.
    ///
    /// The whole body is read as text before the status is classified, so
    /// `handlers` see it. The underlying response is consumed before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` for malformed requests (before any network
    /// activity), `DispatchError` for cancellation, timeout and transport
    /// failures, a handler's error, or `DaemonError` for unhandled failure
    /// statuses.
    pub async fn request(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
        handlers: &HandlerChain,
    ) -> Result<ApiResponse> {
        let (outbound, scope) =
            self.prepare(request, Timeout::After(self.default_timeout), cancel)?;
        let completion = self.dispatcher.send_full_body(outbound, &scope).await?;
        classify(completion.status(), Some(completion.body_text()), handlers)?;

        let (status, _headers, text) = completion.into_parts();
        Ok(ApiResponse::new(status, text))
    }

    /// Perform a call that returns the live response body.
    ///
    /// Completes once headers arrive; handlers see no body. Without a
    /// timeout override only `cancel` can end the wait for headers.
    ///
    /// # Errors
    ///
    /// See [`EngineClient::request`].
    pub async fn request_stream(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
        handlers: &HandlerChain,
    ) -> Result<BodyStream> {
        let response = self
            .request_streamed_response(request, cancel, handlers)
            .await?;
        let (_status, _headers, body) = response.into_parts();
        Ok(body)
    }

    /// Perform a call that returns status, headers and the live body.
    ///
    /// # Errors
    ///
    /// See [`EngineClient::request`].
    pub async fn request_streamed_response(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
        handlers: &HandlerChain,
    ) -> Result<StreamedResponse> {
        let (outbound, scope) = self.prepare(request, Timeout::Infinite, cancel)?;
        let completion = self.dispatcher.send_headers_only(outbound, &scope).await?;
        classify(completion.status(), None, handlers)?;

        let (status, headers, body) = completion.into_parts();
        Ok(StreamedResponse::new(status, headers, body))
    }

    /// Verify the daemon is responsive.
    ///
    /// Sends `GET /_ping` with a short timeout. This confirms the daemon is
    /// operational, not just that the endpoint accepts connections.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::TimedOut` if the daemon does not answer within
    /// [`HEALTH_CHECK_TIMEOUT_SECS`], or any other call error.
    pub async fn health_check(&self) -> Result<()> {
        let request = ApiRequest::get(PING_PATH)
            .timeout(Timeout::After(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS)));
        self.request(request, &CancellationToken::new(), &HandlerChain::new())
            .await?;
        Ok(())
    }

    /// Build the outbound request and compose its cancellation scope.
    fn prepare(
        &self,
        request: ApiRequest,
        default_timeout: Timeout,
        cancel: &CancellationToken,
    ) -> Result<(reqwest::Request, CancellationScope)> {
        let timeout = request.timeout_override().unwrap_or(default_timeout);
        let outbound = self.builder.build(request)?;
        Ok((outbound, compose(cancel, timeout)))
    }
}
