//! Configuration loading with layered precedence.
//!
//! This module loads configuration with the precedence order (lowest to
//! highest): application defaults, configuration file, environment variables.
//!
//! Layers are composed by hand with `MergeComposer` rather than through the
//! derived `load()`: dockwire is a library and must not parse the host
//! process's command line, and `OrthoConfig`'s environment layer silently
//! ignores unparseable values where this loader fails fast.
//!
//! # Environment Variable Handling
//!
//! String fields (e.g., `DOCKWIRE_ENDPOINT`) are always accepted. Integer
//! fields (e.g., `DOCKWIRE_DEFAULT_TIMEOUT_SECS`) must parse or loading fails
//! with `ConfigError::InvalidValue`.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use mockable::{DefaultEnv, Env};
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ConfigError, Result};

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Unsigned 64-bit integer. Invalid values return an error.
    U64,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    /// The environment variable name (e.g., `DOCKWIRE_ENDPOINT`).
    env_var: &'static str,
    /// The JSON path segments (e.g., `["tls", "ca_cert_path"]`).
    path: &'static [&'static str],
    /// The expected value type.
    var_type: EnvVarType,
}

/// Table of all environment variables and their JSON paths.
const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "DOCKWIRE_ENDPOINT",
        path: &["endpoint"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "DOCKWIRE_API_VERSION",
        path: &["api_version"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "DOCKWIRE_DEFAULT_TIMEOUT_SECS",
        path: &["default_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "DOCKWIRE_CONNECT_TIMEOUT_SECS",
        path: &["connect_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    // TLS fields
    EnvVarSpec {
        env_var: "DOCKWIRE_TLS_CLIENT_CERT_PATH",
        path: &["tls", "client_cert_path"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "DOCKWIRE_TLS_CLIENT_KEY_PATH",
        path: &["tls", "client_key_path"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "DOCKWIRE_TLS_CA_CERT_PATH",
        path: &["tls", "ca_cert_path"],
        var_type: EnvVarType::String,
    },
];

/// Returns the list of environment variable names recognised by the loader.
///
/// Tests use this to clear every `DOCKWIRE_*` variable without keeping a
/// second hard-coded list in sync.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Load a configuration file and push it to the composer.
fn load_config_file(path: &Utf8Path, composer: &mut MergeComposer) -> Result<()> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    composer.push_file(value, Some(path.to_path_buf()));
    Ok(())
}

/// Discover a configuration file via `DOCKWIRE_CONFIG_PATH` and XDG paths.
fn discover_config_file() -> Option<Utf8PathBuf> {
    let discovery = ConfigDiscovery::builder("dockwire")
        .env_var("DOCKWIRE_CONFIG_PATH")
        .config_file_name("config.toml")
        .dotfile_name(".dockwire.toml")
        .build();
    discovery
        .candidates()
        .into_iter()
        .filter(|p| p.exists())
        .find_map(|p| Utf8PathBuf::try_from(p).ok())
}

/// Load configuration from the process environment.
///
/// See [`load_config_with_env`].
///
/// # Errors
///
/// Returns `ConfigError` when a layer cannot be read or validated.
pub fn load_config(config_path: Option<&Utf8Path>) -> Result<ClientConfig> {
    load_config_with_env(config_path, &DefaultEnv::new())
}

/// Load configuration with full layer precedence.
///
/// Layers, lowest to highest:
/// 1. Application defaults
/// 2. Configuration file: `config_path` when it exists, otherwise the first
///    discovered candidate
/// 3. `DOCKWIRE_*` environment variables read through `env`
///
/// The merged configuration is validated before it is returned.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - the configuration file is malformed
/// - a typed environment variable has an invalid value
/// - the merged configuration fails validation
pub fn load_config_with_env<E: Env>(
    config_path: Option<&Utf8Path>,
    env: &E,
) -> Result<ClientConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(ClientConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    let file = config_path
        .filter(|path| path.exists())
        .map(Utf8Path::to_path_buf)
        .or_else(discover_config_file);
    if let Some(path) = file.as_deref() {
        debug!(%path, "loading dockwire configuration file");
        load_config_file(path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let config =
        ClientConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    config.validate()?;
    Ok(config)
}

/// Collect `DOCKWIRE_*` environment variables into a JSON value.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if an integer variable cannot be
/// parsed.
fn collect_env_vars<E: Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var) else {
            continue;
        };

        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::U64 => match raw_value.trim().parse::<u64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: spec.env_var.to_owned(),
                        reason: format!("expected unsigned integer, got '{raw_value}'"),
                    }
                    .into());
                }
            },
        };

        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

/// Insert a value at a nested path in a JSON map, creating intermediate
/// objects as needed.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(field.to_owned(), value);
}
