//! Custom error types for the gateway.
//!
//! This module defines [`GatewayError`], the error type for everything that
//! happens outside the per-command path: loading configuration, binding the
//! listener, building the HTTP client. Using `thiserror`, it keeps these
//! failures in one place so `main` can report them uniformly.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: the configuration could not be loaded or failed validation.
//! - **`Io`**: socket and file I/O, mostly from binding or accepting.
//! - **`Http`**: the HTTP client could not be constructed.
//!
//! Command-level failures never surface as `GatewayError`. They are folded
//! into `validation_err`, `operation_err` or `timeout_err` replies by the
//! [`Gateway`](crate::gateway::Gateway).

use crate::config::ConfigError;
use thiserror::Error;

/// Convenience alias for results using the gateway error type.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Startup and infrastructure failures.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Socket or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(reqwest::Error),
}
