//! Configuration system for dockwire clients.
//!
//! Configuration loading and precedence merging is handled by the
//! `ortho_config` crate. Precedence: environment variables override
//! configuration files, which override defaults.
//!
//! The configuration file is expected at `~/.config/dockwire/config.toml` by
//! default.
//!
//! # Example Configuration
//!
//! ```toml
//! endpoint = "tcp://engine.internal:2376"
//! api_version = "1.43"
//! default_timeout_secs = 100
//! connect_timeout_secs = 120
//!
//! [tls]
//! client_cert_path = "/home/user/.docker/cert.pem"
//! client_key_path = "/home/user/.docker/key.pem"
//! ca_cert_path = "/home/user/.docker/ca.pem"
//! ```

mod endpoint;
mod loader;
mod types;


pub use endpoint::{DEFAULT_ENDPOINT, EndpointResolver};
pub use loader::{env_var_names, load_config, load_config_with_env};
pub use types::{ClientConfig, DEFAULT_TIMEOUT_SECS, TlsConfig};
