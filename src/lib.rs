//! Network gateway for a single inspection device.
//!
//! Clients connect over TCP and send plain-text commands. The gateway checks
//! each command against a mirror of the device's operating state and
//! configuration, forwards legal ones over HTTP with a deadline chosen from
//! the command and the current photometric mode, retries transient failures,
//! and keeps the mirror consistent with what the device reports.
//!
//! - [`validator`]: command grammar, state machine and value rules
//! - [`gateway`]: the serialized validate/send/retry/record pipeline
//! - [`transport`]: the HTTP device link and a simulated device
//! - [`server`]: TCP framing and per-connection tasks
//! - [`config`]: layered configuration

pub mod config;
pub mod error;
pub mod gateway;
pub mod server;
pub mod transport;
pub mod validator;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{Gateway, Reply};
