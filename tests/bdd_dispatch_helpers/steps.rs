//! Given/when steps for dispatch scenarios.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dockwire::cancellation::Timeout;
use dockwire::client::{EngineClient, ExecuteFuture, HttpTransport};
use dockwire::error::{DispatchError, DockwireError, HandlerError};
use dockwire::request::{ApiRequest, Endpoint};
use dockwire::response::HandlerChain;
use http::StatusCode;
use mockall::mock;
use rstest_bdd_macros::{given, when};
use tokio_util::sync::CancellationToken;

use super::StepResult;
use super::state::{DaemonBehaviour, DispatchOutcome, DispatchState, SentHeaders};

mock! {
    #[derive(Debug)]
    DaemonTransport {}

    impl HttpTransport for DaemonTransport {
        fn execute(&self, request: reqwest::Request) -> ExecuteFuture<'_>;
    }
}

/// Which dispatch primitive a scenario exercises.
#[derive(Clone, Copy)]
enum CallKind {
    Buffered,
    Stream,
}

#[given("the daemon answers with status {status} and body {body}")]
fn given_daemon_answers(dispatch_state: &DispatchState, status: u16, body: String) {
    dispatch_state
        .daemon
        .set(DaemonBehaviour::Answers { status, body });
}

#[given("the daemon never answers")]
fn given_daemon_silent(dispatch_state: &DispatchState) {
    dispatch_state.daemon.set(DaemonBehaviour::Silent);
}

#[given("the call timeout is {seconds} seconds")]
fn given_call_timeout(dispatch_state: &DispatchState, seconds: u64) {
    dispatch_state
        .timeout
        .set(Timeout::After(Duration::from_secs(seconds)));
}

#[given("the call has no timeout")]
fn given_no_timeout(dispatch_state: &DispatchState) {
    dispatch_state.timeout.set(Timeout::Infinite);
}

#[given("the caller cancels after {seconds} seconds")]
fn given_caller_cancels(dispatch_state: &DispatchState, seconds: u64) {
    dispatch_state.cancel_after_secs.set(seconds);
}

#[given("a handler rejects status {status} with message {message}")]
fn given_rejecting_handler(dispatch_state: &DispatchState, status: u16, message: String) {
    let mut rejections = dispatch_state.rejections.get().unwrap_or_default();
    rejections.push((status, message));
    dispatch_state.rejections.set(rejections);
}

#[given("a recording handler is registered")]
fn given_recording_handler(dispatch_state: &DispatchState) {
    dispatch_state
        .observed_bodies
        .set(Arc::new(Mutex::new(Vec::new())));
}

#[given("the caller adds header {name} with value {value}")]
fn given_caller_header(dispatch_state: &DispatchState, name: String, value: String) {
    let mut headers = dispatch_state.headers.get().unwrap_or_default();
    headers.push((name, value));
    dispatch_state.headers.set(headers);
}

#[when("a buffered request is sent to {path}")]
fn when_buffered_request(dispatch_state: &DispatchState, path: String) -> StepResult<()> {
    run_call(dispatch_state, &path, CallKind::Buffered)
}

#[when("a stream request is sent to {path}")]
fn when_stream_request(dispatch_state: &DispatchState, path: String) -> StepResult<()> {
    run_call(dispatch_state, &path, CallKind::Stream)
}

fn answer(status: u16, body: String) -> ExecuteFuture<'static> {
    Box::pin(async move {
        http::Response::builder()
            .status(status)
            .body(body)
            .map(reqwest::Response::from)
            .map_err(|e| DispatchError::Transport {
                message: e.to_string(),
            })
    })
}

fn never_answer() -> ExecuteFuture<'static> {
    Box::pin(std::future::pending::<Result<reqwest::Response, DispatchError>>())
}

fn build_transport(behaviour: DaemonBehaviour, sent_headers: SentHeaders) -> MockDaemonTransport {
    let mut transport = MockDaemonTransport::new();
    transport.expect_execute().returning(move |request| {
        if let Ok(mut slot) = sent_headers.lock() {
            *slot = Some(request.headers().clone());
        }
        match behaviour.clone() {
            DaemonBehaviour::Answers { status, body } => answer(status, body),
            DaemonBehaviour::Silent => never_answer(),
        }
    });
    transport
}

fn build_handlers(dispatch_state: &DispatchState) -> StepResult<HandlerChain> {
    let mut chain = HandlerChain::new();
    for (code, message) in dispatch_state.rejections.get().unwrap_or_default() {
        let status =
            StatusCode::from_u16(code).map_err(|e| format!("invalid handler status: {e}"))?;
        chain = chain.on_status(status, move |_| message.clone());
    }
    if let Some(observed) = dispatch_state.observed_bodies.get() {
        chain = chain.with(
            move |_: StatusCode, body: Option<&str>| -> Result<(), HandlerError> {
                observed
                    .lock()
                    .map_err(|_| HandlerError::from("mutex poisoned"))?
                    .push(body.map(String::from));
                Ok(())
            },
        );
    }
    Ok(chain)
}

fn build_request(dispatch_state: &DispatchState, path: &str) -> ApiRequest {
    let request = ApiRequest::get(path).headers(dispatch_state.headers.get().unwrap_or_default());
    match dispatch_state.timeout.get() {
        Some(timeout) => request.timeout(timeout),
        None => request,
    }
}

fn outcome_from_error(error: &DockwireError) -> DispatchOutcome {
    match error {
        DockwireError::Daemon(daemon) => DispatchOutcome::Daemon {
            status: daemon.status.as_u16(),
            body: daemon.body.clone(),
        },
        DockwireError::Handled { source, .. } => DispatchOutcome::Handled {
            message: source.to_string(),
        },
        DockwireError::Dispatch(DispatchError::TimedOut { .. }) => DispatchOutcome::TimedOut,
        DockwireError::Dispatch(DispatchError::Cancelled) => DispatchOutcome::Cancelled,
        other => DispatchOutcome::Other(other.to_string()),
    }
}

fn run_call(dispatch_state: &DispatchState, path: &str, kind: CallKind) -> StepResult<()> {
    let behaviour = dispatch_state
        .daemon
        .get()
        .ok_or_else(|| String::from("daemon behaviour should be configured"))?;
    let sent_headers = dispatch_state
        .sent_headers
        .get()
        .ok_or_else(|| String::from("header capture should be initialised"))?;
    let endpoint = Endpoint::new("http://localhost:2375", None)
        .map_err(|e| format!("invalid endpoint: {e}"))?;
    let client = EngineClient::with_transport(
        endpoint,
        Arc::new(build_transport(behaviour, sent_headers)),
    );
    let handlers = build_handlers(dispatch_state)?;
    let request = build_request(dispatch_state, path);
    let cancel = CancellationToken::new();
    let cancel_after = dispatch_state.cancel_after_secs.get();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .map_err(|e| format!("failed to create runtime: {e}"))?;

    let outcome = runtime.block_on(async {
        if let Some(seconds) = cancel_after {
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                trigger.cancel();
            });
        }

        match kind {
            CallKind::Buffered => match client.request(request, &cancel, &handlers).await {
                Ok(response) => DispatchOutcome::Buffered {
                    status: response.status().as_u16(),
                    body: response.into_body(),
                },
                Err(error) => outcome_from_error(&error),
            },
            CallKind::Stream => match client.request_stream(request, &cancel, &handlers).await {
                Ok(stream) => match stream.collect_bytes().await {
                    Ok(bytes) => DispatchOutcome::Streamed {
                        text: String::from_utf8_lossy(&bytes).into_owned(),
                    },
                    Err(error) => DispatchOutcome::Other(error.to_string()),
                },
                Err(error) => outcome_from_error(&error),
            },
        }
    });

    dispatch_state.outcome.set(outcome);
    Ok(())
}
