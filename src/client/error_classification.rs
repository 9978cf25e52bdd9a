//! Error classification helpers for transport failures.
//!
//! This module converts low-level `reqwest` errors into semantic
//! `DispatchError` variants so callers can tell an unreachable daemon from a
//! connection that broke mid-exchange.

use std::io::ErrorKind;

use crate::error::DispatchError;

/// Returns whether an I/O error kind means the daemon could not be reached.
const fn is_unreachable_kind(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::NotFound
            | ErrorKind::AddrNotAvailable
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
            | ErrorKind::PermissionDenied
    )
}

/// Classify a failed exchange into a semantic `DispatchError`.
///
/// Connect-phase failures (including connect timeouts) and errors whose
/// source chain carries an "unreachable" I/O kind become
/// `ConnectionFailed`. Body and decode failures become `BodyRead`. Anything
/// else falls back to `Transport`.
pub(super) fn classify_transport_error(error: &reqwest::Error) -> DispatchError {
    let message = error.to_string();

    if error.is_connect() || io_error_kind_in_chain(error).is_some_and(is_unreachable_kind) {
        return DispatchError::ConnectionFailed { message };
    }
    if error.is_body() || error.is_decode() {
        return DispatchError::BodyRead { message };
    }
    DispatchError::Transport { message }
}

/// Classify a failure while reading a buffered response body.
pub(super) fn classify_body_error(error: &reqwest::Error) -> DispatchError {
    DispatchError::BodyRead {
        message: error.to_string(),
    }
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn std::error::Error) -> Option<ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
