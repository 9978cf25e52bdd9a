//! Response shapes handed back to callers, plus status interpretation.
//!
//! A call produces exactly one of three shapes:
//!
//! - [`ApiResponse`]: status and fully buffered body text. The underlying
//!   response has been consumed before the call returns.
//! - [`BodyStream`]: a live byte stream. The caller owns it; dropping it
//!   releases the connection.
//! - [`StreamedResponse`]: status, headers and a live [`BodyStream`], for
//!   long-lived reads that also need header inspection (for example the
//!   content type of a multiplexed log stream).

mod interpret;

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::io::StreamReader;

pub use interpret::{ErrorHandler, HandlerChain, classify, is_success};

/// Buffered daemon response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    /// Create a buffered response.
    #[must_use]
    pub const fn new(status: StatusCode, body: String) -> Self {
        Self { status, body }
    }

    /// Return the status reported by the daemon.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Return the body text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consume the response and return the body text.
    #[must_use]
    pub fn into_body(self) -> String {
        self.body
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Live response body owned by the caller.
///
/// Yields chunks as the daemon sends them. Use [`BodyStream::into_reader`]
/// to read it through `tokio::io::AsyncRead`.
pub struct BodyStream {
    inner: ByteStream,
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream").finish_non_exhaustive()
    }
}

impl BodyStream {
    /// Wrap a live transport response. The body is not read here.
    #[must_use]
    pub fn from_response(response: reqwest::Response) -> Self {
        Self::from_stream(response.bytes_stream().map_err(io::Error::other))
    }

    /// Wrap an arbitrary byte stream.
    #[must_use]
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Convert the stream into an `AsyncRead`.
    #[must_use]
    pub fn into_reader(self) -> StreamReader<Self, Bytes> {
        StreamReader::new(self)
    }

    /// Read the remainder of the stream into memory.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error reported by the transport.
    pub async fn collect_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut collected = Vec::new();
        while let Some(chunk) = self.next().await {
            collected.extend_from_slice(&chunk?);
        }
        Ok(collected)
    }
}

impl Stream for BodyStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Long-lived response retaining status, headers and the live body.
#[derive(Debug)]
pub struct StreamedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: BodyStream,
}

impl StreamedResponse {
    /// Create a streamed response.
    #[must_use]
    pub const fn new(status: StatusCode, headers: HeaderMap, body: BodyStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Return the status reported by the daemon.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Return the response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Return the `Content-Type` header as text, if present and valid.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Return a mutable handle on the live body.
    pub const fn body_mut(&mut self) -> &mut BodyStream {
        &mut self.body
    }

    /// Split into status, headers and body, passing stream ownership on.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, HeaderMap, BodyStream) {
        (self.status, self.headers, self.body)
    }
}
