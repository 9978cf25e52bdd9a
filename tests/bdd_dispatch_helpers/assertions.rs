//! Assertion steps for dispatch behavioural tests.

use dockwire::request::USER_AGENT_VALUE;
use http::header::USER_AGENT;
use rstest_bdd_macros::then;

use super::StepResult;
use super::state::{DispatchOutcome, DispatchState};

fn outcome(dispatch_state: &DispatchState) -> StepResult<DispatchOutcome> {
    dispatch_state
        .outcome
        .get()
        .ok_or_else(|| String::from("outcome should be set"))
}

#[then("the call succeeds with status {expected}")]
fn call_succeeds(dispatch_state: &DispatchState, expected: u16) -> StepResult<()> {
    match outcome(dispatch_state)? {
        DispatchOutcome::Buffered { status, .. } if status == expected => Ok(()),
        other => Err(format!("expected success with {expected}, got {other:?}")),
    }
}

#[then("the response body is {expected}")]
fn response_body_is(dispatch_state: &DispatchState, expected: String) -> StepResult<()> {
    match outcome(dispatch_state)? {
        DispatchOutcome::Buffered { body, .. } if body == expected => Ok(()),
        other => Err(format!("expected body {expected}, got {other:?}")),
    }
}

#[then("the call fails with daemon status {expected}")]
fn call_fails_with_daemon_status(dispatch_state: &DispatchState, expected: u16) -> StepResult<()> {
    match outcome(dispatch_state)? {
        DispatchOutcome::Daemon { status, .. } if status == expected => Ok(()),
        other => Err(format!("expected daemon error {expected}, got {other:?}")),
    }
}

#[then("the daemon error body is {expected}")]
fn daemon_error_body_is(dispatch_state: &DispatchState, expected: String) -> StepResult<()> {
    match outcome(dispatch_state)? {
        DispatchOutcome::Daemon {
            body: Some(body), ..
        } if body == expected => Ok(()),
        other => Err(format!("expected daemon error body {expected}, got {other:?}")),
    }
}

#[then("the daemon error has no body")]
fn daemon_error_has_no_body(dispatch_state: &DispatchState) -> StepResult<()> {
    match outcome(dispatch_state)? {
        DispatchOutcome::Daemon { body: None, .. } => Ok(()),
        other => Err(format!("expected daemon error without body, got {other:?}")),
    }
}

#[then("the call fails with handler message {expected}")]
fn call_fails_with_handler_message(
    dispatch_state: &DispatchState,
    expected: String,
) -> StepResult<()> {
    match outcome(dispatch_state)? {
        DispatchOutcome::Handled { message } if message == expected => Ok(()),
        other => Err(format!("expected handler error {expected}, got {other:?}")),
    }
}

#[then("the call times out")]
fn call_times_out(dispatch_state: &DispatchState) -> StepResult<()> {
    match outcome(dispatch_state)? {
        DispatchOutcome::TimedOut => Ok(()),
        other => Err(format!("expected timeout, got {other:?}")),
    }
}

#[then("the call is cancelled")]
fn call_is_cancelled(dispatch_state: &DispatchState) -> StepResult<()> {
    match outcome(dispatch_state)? {
        DispatchOutcome::Cancelled => Ok(()),
        other => Err(format!("expected cancellation, got {other:?}")),
    }
}

#[then("the stream yields {expected}")]
fn stream_yields(dispatch_state: &DispatchState, expected: String) -> StepResult<()> {
    match outcome(dispatch_state)? {
        DispatchOutcome::Streamed { text } if text == expected => Ok(()),
        other => Err(format!("expected stream text {expected}, got {other:?}")),
    }
}

#[then("the recording handler observed no body")]
fn recording_handler_observed_no_body(dispatch_state: &DispatchState) -> StepResult<()> {
    let observed = dispatch_state
        .observed_bodies
        .get()
        .ok_or_else(|| String::from("recording handler should be registered"))?;
    let bodies = observed
        .lock()
        .map_err(|_| String::from("mutex poisoned"))?
        .clone();
    if bodies == vec![None] {
        Ok(())
    } else {
        Err(format!("expected exactly one body-less observation, got {bodies:?}"))
    }
}

#[then("the request carried only the User-Agent header")]
fn request_carried_only_user_agent(dispatch_state: &DispatchState) -> StepResult<()> {
    let captured = dispatch_state
        .sent_headers
        .get()
        .ok_or_else(|| String::from("header capture should be initialised"))?;
    let headers = captured
        .lock()
        .map_err(|_| String::from("mutex poisoned"))?
        .clone()
        .ok_or_else(|| String::from("no request reached the daemon"))?;

    let user_agent = headers.get(USER_AGENT).and_then(|value| value.to_str().ok());
    if headers.len() == 1 && user_agent == Some(USER_AGENT_VALUE) {
        Ok(())
    } else {
        Err(format!("expected only User-Agent, got {headers:?}"))
    }
}

#[then("the request carried header {name} with value {expected}")]
fn request_carried_header(
    dispatch_state: &DispatchState,
    name: String,
    expected: String,
) -> StepResult<()> {
    let captured = dispatch_state
        .sent_headers
        .get()
        .ok_or_else(|| String::from("header capture should be initialised"))?;
    let headers = captured
        .lock()
        .map_err(|_| String::from("mutex poisoned"))?
        .clone()
        .ok_or_else(|| String::from("no request reached the daemon"))?;

    let actual = headers
        .get(name.as_str())
        .and_then(|value| value.to_str().ok());
    if actual == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(format!("expected {name}: {expected}, got {actual:?}"))
    }
}
