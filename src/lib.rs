//! Request dispatch and response handling for container engine REST APIs.
//!
//! `dockwire` is the transport core that typed operation façades (containers,
//! images, volumes, ...) sit on. It turns a logical API call into an HTTP
//! exchange with a Docker-compatible daemon, bounds it with a timeout and the
//! caller's cancellation token, classifies the outcome, and hands back the
//! response in one of three shapes: buffered text, a live byte stream, or a
//! streamed response that also keeps status and headers.
//!
//! # Architecture
//!
//! A call flows through the request builder, the cancellation composer, the
//! dispatcher, the response interpreter and finally the materializer. The
//! transport is built once per [`client::EngineClient`] from a
//! [`transport::Credentials`] capability and shared by every call.
//!
//! # Modules
//!
//! - [`cancellation`]: Per-call timeout and cancellation composition
//! - [`client`]: The engine client, its dispatcher and health check
//! - [`config`]: Layered configuration (env > file > defaults) and endpoint
//!   resolution
//! - [`error`]: Semantic error types
//! - [`request`]: Endpoint identity and outbound request assembly
//! - [`response`]: Response shapes and status interpretation
//! - [`transport`]: Transport construction from credentials

pub mod cancellation;
pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod transport;
