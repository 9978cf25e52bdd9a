//! Request dispatch over the shared transport.
//!
//! The dispatcher sends one prepared request inside a [`CancellationScope`]
//! and hands back a [`Completion`]. It never interprets the status: that is
//! left to the response interpreter.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use tracing::{debug, warn};

use super::error_classification::{classify_body_error, classify_transport_error};
use crate::cancellation::CancellationScope;
use crate::error::DispatchError;
use crate::response::BodyStream;

/// Future returned by [`HttpTransport::execute`].
pub type ExecuteFuture<'a> =
    Pin<Box<dyn Future<Output = Result<reqwest::Response, DispatchError>> + Send + 'a>>;

/// Seam over the HTTP client that performs a single exchange.
///
/// Implementations resolve once response headers are available; the body is
/// left unread on the returned response.
pub trait HttpTransport: Send + Sync {
    /// Send `request` and wait for the response headers.
    fn execute(&self, request: reqwest::Request) -> ExecuteFuture<'_>;
}

impl HttpTransport for reqwest::Client {
    fn execute(&self, request: reqwest::Request) -> ExecuteFuture<'_> {
        Box::pin(async move {
            Self::execute(self, request)
                .await
                .map_err(|e| classify_transport_error(&e))
        })
    }
}

/// How much of the response must arrive before a dispatch completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Wait for the whole body and buffer it as text.
    FullBody,
    /// Complete as soon as the headers arrive, leaving the body live.
    HeadersOnly,
}

/// Result of a dispatch: status, headers and the body in its completed form.
///
/// `B` is `String` for [`CompletionMode::FullBody`] and [`BodyStream`] for
/// [`CompletionMode::HeadersOnly`].
#[derive(Debug)]
pub struct Completion<B> {
    status: StatusCode,
    headers: HeaderMap,
    body: B,
}

impl<B> Completion<B> {
    /// Returns the status reported by the daemon.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Split into status, headers and body.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, HeaderMap, B) {
        (self.status, self.headers, self.body)
    }
}

impl Completion<String> {
    /// Returns the buffered body text.
    #[must_use]
    pub fn body_text(&self) -> &str {
        &self.body
    }
}

/// Sends prepared requests over a shared [`HttpTransport`].
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher over `transport`.
    #[must_use]
    pub const fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Send `request` in [`CompletionMode::FullBody`].
    ///
    /// Both the exchange and the body read happen inside `scope`, so a
    /// daemon that sends headers and then stalls is still bounded by it.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::TimedOut` or `DispatchError::Cancelled` when
    /// the scope fires, and a classified transport error otherwise.
    pub async fn send_full_body(
        &self,
        request: reqwest::Request,
        scope: &CancellationScope,
    ) -> Result<Completion<String>, DispatchError> {
        self.send(request, CompletionMode::FullBody, scope, |response| async move {
            response.text().await.map_err(|e| classify_body_error(&e))
        })
        .await
    }

    /// Send `request` in [`CompletionMode::HeadersOnly`].
    ///
    /// Completes once headers arrive. The body is handed back unread and is
    /// no longer bound to `scope`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::send_full_body`].
    pub async fn send_headers_only(
        &self,
        request: reqwest::Request,
        scope: &CancellationScope,
    ) -> Result<Completion<BodyStream>, DispatchError> {
        self.send(request, CompletionMode::HeadersOnly, scope, |response| async move {
            Ok(BodyStream::from_response(response))
        })
        .await
    }

    /// Run the exchange and `complete` inside `scope`, logging the outcome.
    /// When the scope fires first the in-flight work is dropped.
    async fn send<B, F, Fut>(
        &self,
        request: reqwest::Request,
        mode: CompletionMode,
        scope: &CancellationScope,
        complete: F,
    ) -> Result<Completion<B>, DispatchError>
    where
        F: FnOnce(reqwest::Response) -> Fut,
        Fut: Future<Output = Result<B, DispatchError>>,
    {
        let method = request.method().clone();
        let uri = request.url().clone();
        debug!(%method, %uri, ?mode, timer = scope.has_timer(), "dispatching request");

        let exchange = async {
            let response = self.transport.execute(request).await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = complete(response).await?;
            Ok::<_, DispatchError>(Completion {
                status,
                headers,
                body,
            })
        };

        let outcome = scope.run(exchange).await.and_then(|r| r);
        match &outcome {
            Ok(completion) => {
                debug!(%method, %uri, status = completion.status.as_u16(), "request completed");
            }
            Err(error) if error.is_cancellation() => {
                debug!(%method, %uri, %error, "request abandoned");
            }
            Err(error) => warn!(%method, %uri, %error, "request failed"),
        }
        outcome
    }
}
