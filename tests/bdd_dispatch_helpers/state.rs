//! Scenario state for dispatch behavioural tests.

use std::sync::{Arc, Mutex};

use dockwire::cancellation::Timeout;
use http::HeaderMap;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

/// How the mocked daemon behaves.
#[derive(Debug, Clone)]
pub(crate) enum DaemonBehaviour {
    /// Answer every call with a status and body.
    Answers { status: u16, body: String },
    /// Never answer.
    Silent,
}

/// Observable outcome of a dispatched call.
#[derive(Debug, Clone)]
pub(crate) enum DispatchOutcome {
    /// A buffered call succeeded.
    Buffered { status: u16, body: String },
    /// A stream call succeeded; the stream was read to the end.
    Streamed { text: String },
    /// The daemon reported an unhandled failure status.
    Daemon { status: u16, body: Option<String> },
    /// A caller handler rejected the response.
    Handled { message: String },
    /// The per-call timeout elapsed.
    TimedOut,
    /// The caller's token fired.
    Cancelled,
    /// Any other failure.
    Other(String),
}

/// Bodies observed by a recording handler.
pub(crate) type ObservedBodies = Arc<Mutex<Vec<Option<String>>>>;

/// Headers captured from the outbound request.
pub(crate) type SentHeaders = Arc<Mutex<Option<HeaderMap>>>;

#[derive(Default, ScenarioState)]
pub(crate) struct DispatchState {
    pub(crate) daemon: Slot<DaemonBehaviour>,
    pub(crate) timeout: Slot<Timeout>,
    pub(crate) rejections: Slot<Vec<(u16, String)>>,
    pub(crate) headers: Slot<Vec<(String, String)>>,
    pub(crate) cancel_after_secs: Slot<u64>,
    pub(crate) observed_bodies: Slot<ObservedBodies>,
    pub(crate) sent_headers: Slot<SentHeaders>,
    pub(crate) outcome: Slot<DispatchOutcome>,
}

#[fixture]
pub(crate) fn dispatch_state() -> DispatchState {
    let state = DispatchState::default();
    state.rejections.set(Vec::new());
    state.headers.set(Vec::new());
    state.sent_headers.set(Arc::new(Mutex::new(None)));
    state
}
