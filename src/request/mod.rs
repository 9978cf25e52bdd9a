//! Outbound request assembly.
//!
//! An [`ApiRequest`] describes a logical daemon operation: method, path,
//! query, headers, optional content and an optional timeout override. The
//! [`RequestBuilder`] combines it with the client's [`Endpoint`] to produce
//! the `reqwest::Request` handed to the dispatcher.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue, USER_AGENT};
use http::Method;
use serde::Serialize;
use url::Url;

use crate::cancellation::Timeout;
use crate::error::{ConfigError, RequestError};

/// Client-identifying header value sent with every request.
pub const USER_AGENT_VALUE: &str = concat!("dockwire/", env!("CARGO_PKG_VERSION"));

/// A daemon REST API version such as `1.43`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    major: u16,
    minor: u16,
}

impl ApiVersion {
    /// Create an API version from its components.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidValue {
            field: String::from("api_version"),
            reason: format!("expected MAJOR.MINOR, got '{value}'"),
        };
        let trimmed = value.trim().trim_start_matches('v');
        let (major, minor) = trimmed.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

/// Base address of the daemon plus the requested API version.
///
/// Immutable for the lifetime of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
    api_version: Option<ApiVersion>,
}

impl Endpoint {
    /// Create an endpoint from a base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsupportedEndpoint` when the URL does not
    /// parse, or uses a scheme other than `http` or `https`.
    pub fn new(base: &str, api_version: Option<ApiVersion>) -> Result<Self, ConfigError> {
        let url = Url::parse(base).map_err(|e| ConfigError::UnsupportedEndpoint {
            endpoint: String::from(base),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedEndpoint {
                endpoint: String::from(base),
                reason: String::from("only http and https endpoints can be dispatched to"),
            });
        }
        Ok(Self {
            base: url,
            api_version,
        })
    }

    /// Return the base URL.
    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// Return the requested API version, if any.
    #[must_use]
    pub const fn api_version(&self) -> Option<ApiVersion> {
        self.api_version
    }

    /// Combine the endpoint with a call's path and query into a final URI.
    ///
    /// The API version, when set, is inserted as a `/v{version}` segment
    /// ahead of the path.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::InvalidUri` if `path` carries its own query
    /// string or fragment.
    pub fn uri_for(&self, path: &str, query: &Query) -> Result<Url, RequestError> {
        if path.contains(['?', '#']) {
            return Err(RequestError::InvalidUri {
                message: format!("path '{path}' must not contain a query or fragment"),
            });
        }

        let base_path = self.base.path().trim_end_matches('/');
        let version_segment = self
            .api_version
            .map(|version| format!("/v{version}"))
            .unwrap_or_default();
        let call_path = path.trim_start_matches('/');

        let mut url = self.base.clone();
        url.set_path(&format!("{base_path}{version_segment}/{call_path}"));
        url.set_query(None);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.pairs());
        }
        Ok(url)
    }
}

/// Ordered query parameters. Keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    /// Create an empty query.
    #[must_use]
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append a parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    /// Append a parameter only when `value` is present.
    #[must_use]
    pub fn with_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Return whether the query has no parameters.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over the parameters in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Materialised request body with its media type.
#[derive(Debug)]
pub struct Content {
    body: reqwest::Body,
    content_type: Option<HeaderValue>,
}

impl Content {
    /// Create content from a body and an optional media type.
    #[must_use]
    pub fn new(body: impl Into<reqwest::Body>, content_type: Option<HeaderValue>) -> Self {
        Self {
            body: body.into(),
            content_type,
        }
    }
}

/// Provider of request content.
///
/// The builder calls [`RequestContent::content`] at most once per request,
/// so providers may be expensive or have side effects.
pub trait RequestContent: Send {
    /// Produce the body to attach to the request.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::Content` if the body cannot be produced.
    fn content(self: Box<Self>) -> Result<Content, RequestError>;
}

/// JSON request content encoded with `serde_json`.
#[derive(Debug)]
pub struct JsonContent<T> {
    value: T,
}

impl<T: Serialize + Send> JsonContent<T> {
    /// Wrap a serialisable value.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Serialize + Send> RequestContent for JsonContent<T> {
    fn content(self: Box<Self>) -> Result<Content, RequestError> {
        let encoded = serde_json::to_vec(&self.value).map_err(|e| RequestError::Content {
            message: e.to_string(),
        })?;
        Ok(Content::new(
            encoded,
            Some(HeaderValue::from_static("application/json")),
        ))
    }
}

/// Raw request content, e.g. a tar archive for an upload.
#[derive(Debug)]
pub struct BytesContent {
    bytes: Bytes,
    content_type: &'static str,
}

impl BytesContent {
    /// Wrap raw bytes with the given media type.
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>, content_type: &'static str) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }
}

impl RequestContent for BytesContent {
    fn content(self: Box<Self>) -> Result<Content, RequestError> {
        let media_type =
            HeaderValue::from_str(self.content_type).map_err(|e| RequestError::Content {
                message: format!("invalid media type '{}': {e}", self.content_type),
            })?;
        Ok(Content::new(self.bytes, Some(media_type)))
    }
}

/// Descriptor of a logical daemon operation.
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Query,
    headers: Vec<(String, String)>,
    content: Option<Box<dyn RequestContent>>,
    timeout: Option<Timeout>,
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("has_content", &self.content.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ApiRequest {
    /// Create a request descriptor for `method` on `path`.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::new(),
            headers: Vec::new(),
            content: None,
            timeout: None,
        }
    }

    /// Create a `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a `POST` request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Create a `PUT` request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Create a `DELETE` request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Create a `HEAD` request.
    #[must_use]
    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    /// Set the query parameters.
    #[must_use]
    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Append a header. Repeated names are sent as repeated headers.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append every header from `headers` in order.
    #[must_use]
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a content provider.
    #[must_use]
    pub fn content(mut self, content: impl RequestContent + 'static) -> Self {
        self.content = Some(Box::new(content));
        self
    }

    /// Attach a JSON body encoded with `serde_json`.
    #[must_use]
    pub fn json<T: Serialize + Send + 'static>(self, value: T) -> Self {
        self.content(JsonContent::new(value))
    }

    /// Override the timeout for this call.
    #[must_use]
    pub const fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Return the method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Return the path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Return the timeout override, if any.
    #[must_use]
    pub const fn timeout_override(&self) -> Option<Timeout> {
        self.timeout
    }
}

/// Assembles outbound requests against a fixed endpoint.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    endpoint: Endpoint,
}

impl RequestBuilder {
    /// Create a builder for `endpoint`.
    #[must_use]
    pub const fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Return the endpoint requests are built against.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Build the outbound request for `api_request`.
    ///
    /// Always sets the `User-Agent` header, then appends caller headers in
    /// order. The content provider, when present, is invoked exactly once.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::MissingPath` when the path is empty,
    /// `RequestError::InvalidHeader` for unencodable headers,
    /// `RequestError::InvalidUri` for an unusable URI and
    /// `RequestError::Content` when the content provider fails.
    pub fn build(&self, api_request: ApiRequest) -> Result<reqwest::Request, RequestError> {
        let ApiRequest {
            method,
            path,
            query,
            headers,
            content,
            ..
        } = api_request;

        if path.is_empty() {
            return Err(RequestError::MissingPath);
        }

        let url = self.endpoint.uri_for(&path, &query)?;
        let mut request = reqwest::Request::new(method, url);

        let request_headers = request.headers_mut();
        request_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        for (name, value) in &headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| RequestError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| RequestError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            request_headers.append(header_name, header_value);
        }

        if let Some(provider) = content {
            let Content { body, content_type } = provider.content()?;
            if let Some(media_type) = content_type
                && !request.headers().contains_key(CONTENT_TYPE)
            {
                request.headers_mut().insert(CONTENT_TYPE, media_type);
            }
            *request.body_mut() = Some(body);
        }

        Ok(request)
    }
}
