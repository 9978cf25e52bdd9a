//! Behavioural test helpers for daemon endpoint resolution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use dockwire::config::{ClientConfig, EndpointResolver, TlsConfig};
use dockwire::error::ConfigError;
use mockable::MockEnv;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, then, when};

/// Step result type for BDD tests.
pub type StepResult<T> = Result<T, String>;

/// Thread-safe environment variable storage for BDD tests.
type EnvVars = Arc<Mutex<HashMap<String, String>>>;

/// Outcome of resolving the endpoint.
#[derive(Clone, Debug)]
pub enum ResolutionOutcome {
    /// The endpoint resolved to this URL.
    Resolved(String),
    /// The endpoint scheme is not reachable over HTTP.
    Unsupported,
    /// Resolution failed for another reason.
    Failed(String),
}

/// State shared across endpoint resolution scenarios.
#[derive(Default, ScenarioState)]
pub struct EndpointResolutionState {
    env_vars: Slot<EnvVars>,
    config: Slot<ClientConfig>,
    outcome: Slot<ResolutionOutcome>,
}

/// Fixture providing a fresh endpoint resolution state.
#[fixture]
pub fn endpoint_resolution_state() -> EndpointResolutionState {
    let state = EndpointResolutionState::default();
    state.env_vars.set(Arc::new(Mutex::new(HashMap::new())));
    state.config.set(ClientConfig::default());
    state
}

fn set_env_var(state: &EndpointResolutionState, key: &str, value: &str) -> StepResult<()> {
    let env_vars = state.env_vars.get().ok_or_else(|| String::from("env_vars should be initialised"))?;
    let mut vars = env_vars.lock().map_err(|_| String::from("mutex poisoned"))?;
    vars.insert(String::from(key), String::from(value));
    Ok(())
}

/// Creates a `MockEnv` from a snapshot of the scenario's variables.
fn create_mock_env(state: &EndpointResolutionState) -> StepResult<MockEnv> {
    let env_vars = state.env_vars.get().ok_or_else(|| String::from("env_vars should be initialised"))?;
    let vars = env_vars.lock().map_err(|_| String::from("mutex poisoned"))?.clone();

    let mut mock = MockEnv::new();
    mock.expect_string()
        .returning(move |key| vars.get(key).cloned());
    Ok(mock)
}

fn update_config(
    state: &EndpointResolutionState,
    update: impl FnOnce(&mut ClientConfig),
) -> StepResult<()> {
    let mut config = state.config.get().ok_or_else(|| String::from("config should be initialised"))?;
    update(&mut config);
    state.config.set(config);
    Ok(())
}

#[given("no endpoint is configured")]
fn no_endpoint_configured(endpoint_resolution_state: &EndpointResolutionState) -> StepResult<()> {
    update_config(endpoint_resolution_state, |config| config.endpoint = None)
}

#[given("the endpoint is configured as {endpoint}")]
fn endpoint_configured_as(
    endpoint_resolution_state: &EndpointResolutionState,
    endpoint: String,
) -> StepResult<()> {
    update_config(endpoint_resolution_state, |config| {
        config.endpoint = Some(endpoint);
    })
}

#[given("TLS client credentials are configured")]
fn tls_credentials_configured(
    endpoint_resolution_state: &EndpointResolutionState,
) -> StepResult<()> {
    update_config(endpoint_resolution_state, |config| {
        config.tls = TlsConfig {
            client_cert_path: Some(Utf8PathBuf::from("/certs/cert.pem")),
            client_key_path: Some(Utf8PathBuf::from("/certs/key.pem")),
            ca_cert_path: Some(Utf8PathBuf::from("/certs/ca.pem")),
        };
    })
}

#[given("DOCKER_HOST is set to {value}")]
fn docker_host_is_set_to(
    endpoint_resolution_state: &EndpointResolutionState,
    value: String,
) -> StepResult<()> {
    set_env_var(endpoint_resolution_state, "DOCKER_HOST", &value)
}

#[given("DOCKER_HOST is empty")]
fn docker_host_is_empty(endpoint_resolution_state: &EndpointResolutionState) -> StepResult<()> {
    set_env_var(endpoint_resolution_state, "DOCKER_HOST", "")
}

#[given("CONTAINER_HOST is set to {value}")]
fn container_host_is_set_to(
    endpoint_resolution_state: &EndpointResolutionState,
    value: String,
) -> StepResult<()> {
    set_env_var(endpoint_resolution_state, "CONTAINER_HOST", &value)
}

#[given("PODMAN_HOST is set to {value}")]
fn podman_host_is_set_to(
    endpoint_resolution_state: &EndpointResolutionState,
    value: String,
) -> StepResult<()> {
    set_env_var(endpoint_resolution_state, "PODMAN_HOST", &value)
}

#[when("the endpoint is resolved")]
fn the_endpoint_is_resolved(
    endpoint_resolution_state: &EndpointResolutionState,
) -> StepResult<()> {
    let env = create_mock_env(endpoint_resolution_state)?;
    let config = endpoint_resolution_state
        .config
        .get()
        .ok_or_else(|| String::from("config should be initialised"))?;

    let outcome = match EndpointResolver::new(&env).resolve(&config) {
        Ok(endpoint) => {
            ResolutionOutcome::Resolved(endpoint.base().as_str().trim_end_matches('/').to_owned())
        }
        Err(ConfigError::UnsupportedEndpoint { .. }) => ResolutionOutcome::Unsupported,
        Err(other) => ResolutionOutcome::Failed(other.to_string()),
    };
    endpoint_resolution_state.outcome.set(outcome);
    Ok(())
}

#[then("the resolved endpoint is {expected}")]
fn the_resolved_endpoint_is(
    endpoint_resolution_state: &EndpointResolutionState,
    expected: String,
) -> StepResult<()> {
    match endpoint_resolution_state
        .outcome
        .get()
        .ok_or_else(|| String::from("outcome should be set"))?
    {
        ResolutionOutcome::Resolved(actual) if actual == expected => Ok(()),
        other => Err(format!("expected endpoint {expected}, got {other:?}")),
    }
}

#[then("resolution fails because the endpoint is unsupported")]
fn resolution_fails_unsupported(
    endpoint_resolution_state: &EndpointResolutionState,
) -> StepResult<()> {
    match endpoint_resolution_state
        .outcome
        .get()
        .ok_or_else(|| String::from("outcome should be set"))?
    {
        ResolutionOutcome::Unsupported => Ok(()),
        other => Err(format!("expected an unsupported endpoint error, got {other:?}")),
    }
}
