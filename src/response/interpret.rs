//! Status triage and caller-supplied error handlers.
//!
//! Handlers run in the order the caller registered them. The first handler
//! to return an error wins and the remaining handlers are skipped; when none
//! objects, any status outside `[200, 400)` becomes a [`DaemonError`].

use std::fmt;

use http::StatusCode;
use tracing::warn;

use crate::error::{DaemonError, DockwireError, HandlerError};

/// Inspector that may translate a daemon response into a domain error.
///
/// `body` is `None` for header-only completions (stream calls), so handlers
/// must not rely on it being present.
pub trait ErrorHandler: Send + Sync {
    /// Inspect the response status and body.
    ///
    /// # Errors
    ///
    /// Returns the domain error the handler recognised.
    fn on_response(&self, status: StatusCode, body: Option<&str>) -> Result<(), HandlerError>;
}

impl<F> ErrorHandler for F
where
    F: Fn(StatusCode, Option<&str>) -> Result<(), HandlerError> + Send + Sync,
{
    fn on_response(&self, status: StatusCode, body: Option<&str>) -> Result<(), HandlerError> {
        self(status, body)
    }
}

/// Ordered chain of [`ErrorHandler`]s evaluated for one call.
#[derive(Default)]
pub struct HandlerChain {
    handlers: Vec<Box<dyn ErrorHandler>>,
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("len", &self.handlers.len())
            .finish()
    }
}

impl HandlerChain {
    /// Create an empty chain. Only the default classification applies.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Append a handler to the end of the chain.
    #[must_use]
    pub fn with(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Append a handler that raises `error` whenever the daemon answers with
    /// `status`.
    ///
    /// The error factory receives the body when one was buffered.
    #[must_use]
    pub fn on_status<E, F>(self, status: StatusCode, error: F) -> Self
    where
        E: Into<HandlerError>,
        F: Fn(Option<&str>) -> E + Send + Sync + 'static,
    {
        self.with(
            move |actual: StatusCode, body: Option<&str>| -> Result<(), HandlerError> {
                if actual == status {
                    Err(error(body).into())
                } else {
                    Ok(())
                }
            },
        )
    }

    /// Return the number of handlers.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Return whether the chain has no handlers.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Returns whether `status` lies in the success range `[200, 400)`.
#[must_use]
pub fn is_success(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

/// Classify a daemon response.
///
/// # Errors
///
/// Returns `DockwireError::Handled` for the first handler that objects, or
/// `DockwireError::Daemon` when no handler objects and `status` is outside
/// `[200, 400)`.
pub fn classify(
    status: StatusCode,
    body: Option<&str>,
    handlers: &HandlerChain,
) -> Result<(), DockwireError> {
    for handler in &handlers.handlers {
        handler
            .on_response(status, body)
            .map_err(|source| DockwireError::Handled { status, source })?;
    }

    if is_success(status) {
        return Ok(());
    }

    warn!(status = status.as_u16(), "container engine reported failure");
    Err(DaemonError {
        status,
        body: body.map(String::from),
    }
    .into())
}
