//! Timeout and cancellation composition for dispatched requests.
//!
//! Each call races its in-flight work against a [`CancellationScope`]. The
//! scope merges the caller's [`CancellationToken`] with an optional timer:
//! whichever fires first cancels the call. A finite timeout arms a timer task
//! that cancels a child token; dropping the scope aborts that task, so the
//! timer is released on success, failure and early abandonment alike.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;

/// Per-call timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// No timer is armed; only the caller's token can cancel the call.
    Infinite,
    /// Cancel the call once the duration elapses.
    After(Duration),
}

impl Timeout {
    /// Returns the finite duration, or `None` for [`Timeout::Infinite`].
    #[must_use]
    pub const fn duration(self) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::After(duration) => Some(duration),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

/// Timer armed for a finite timeout. Aborted when dropped.
#[derive(Debug)]
struct TimerGuard {
    handle: JoinHandle<()>,
    elapsed: Arc<AtomicBool>,
    timeout: Duration,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Composed first-wins cancellation signal for a single call.
///
/// The scope must not be reused across dispatches: its timer starts when it
/// is composed.
#[derive(Debug)]
pub struct CancellationScope {
    token: CancellationToken,
    timer: Option<TimerGuard>,
}

/// Merge `base` with `timeout` into a single-use cancellation scope.
///
/// For [`Timeout::Infinite`] the scope observes `base` directly and no timer
/// is armed. Otherwise a child token of `base` is cancelled by a timer task
/// after the timeout elapses.
///
/// Must be called from within a Tokio runtime when `timeout` is finite.
#[must_use]
pub fn compose(base: &CancellationToken, timeout: Timeout) -> CancellationScope {
    let Some(duration) = timeout.duration() else {
        return CancellationScope {
            token: base.clone(),
            timer: None,
        };
    };

    let token = base.child_token();
    let elapsed = Arc::new(AtomicBool::new(false));
    let timer_base = base.clone();
    let timer_token = token.clone();
    let timer_elapsed = Arc::clone(&elapsed);
    let handle = tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        // The caller's token already cancelled the child; it keeps the blame.
        if !timer_base.is_cancelled() {
            timer_elapsed.store(true, Ordering::Release);
            timer_token.cancel();
        }
    });

    CancellationScope {
        token,
        timer: Some(TimerGuard {
            handle,
            elapsed,
            timeout: duration,
        }),
    }
}

impl CancellationScope {
    /// Returns the composed token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns whether a timer was armed for this scope.
    #[must_use]
    pub const fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Returns whether the composed signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Describe why the scope fired.
    ///
    /// Reports [`DispatchError::TimedOut`] when the timer fired before the
    /// caller's token and [`DispatchError::Cancelled`] otherwise, regardless
    /// of when the race is observed.
    #[must_use]
    pub fn cancellation_error(&self) -> DispatchError {
        match &self.timer {
            Some(timer) if timer.elapsed.load(Ordering::Acquire) => DispatchError::TimedOut {
                timeout: timer.timeout,
            },
            _ => DispatchError::Cancelled,
        }
    }

    /// Drive `future` to completion unless the scope fires first.
    ///
    /// When the scope fires the future is dropped, abandoning any in-flight
    /// work, and the cancellation cause is returned.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::TimedOut`] or [`DispatchError::Cancelled`]
    /// when the scope fires before `future` completes.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, DispatchError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(self.cancellation_error()),
            output = future => Ok(output),
        }
    }
}
