//! Device transports.
//!
//! A [`Transport`] delivers one raw command string to the device and returns
//! the raw reply, giving up once the caller's deadline has elapsed. The
//! gateway layers validation, retry and bookkeeping on top; transports only
//! move text.

pub mod http;
pub mod mock;

pub use http::{HttpTransport, HttpTransportBuilder};
pub use mock::MockTransport;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failure to obtain a reply from the device.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No reply arrived before the deadline.
    #[error("device did not answer '{command}' within {deadline:?}")]
    Timeout {
        /// Command that timed out.
        command: String,
        /// Deadline that elapsed.
        deadline: Duration,
    },

    /// The HTTP exchange failed before a reply was read.
    #[error("HTTP request for '{command}' failed: {source}")]
    Http {
        /// Command being sent.
        command: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The device answered with a non-success status.
    #[error("device rejected '{command}' with status {status}")]
    Rejected {
        /// Command the device refused.
        command: String,
        /// HTTP status code.
        status: u16,
        /// Reply body, passed back to the client unchanged.
        body: String,
    },

    /// The device could not be reached at all.
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// A device that answered and refused will refuse again.
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Rejected { .. })
    }
}

/// Sends raw commands to the device.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `command` and return the device's reply text.
    ///
    /// # Errors
    /// - [`TransportError::Timeout`] when `deadline` elapses first
    /// - [`TransportError::Rejected`] when the device refuses the command
    /// - [`TransportError::Http`] / [`TransportError::Unavailable`] for link failures
    async fn send(&self, command: &str, deadline: Duration) -> Result<String, TransportError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_not_transient() {
        let rejected = TransportError::Rejected {
            command: "trigger".to_string(),
            status: 409,
            body: "busy".to_string(),
        };
        assert!(!rejected.is_transient());

        let timeout = TransportError::Timeout {
            command: "trigger".to_string(),
            deadline: Duration::from_millis(3000),
        };
        assert!(timeout.is_transient());
        assert!(TransportError::Unavailable("offline".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::Timeout {
            command: "ping".to_string(),
            deadline: Duration::from_millis(150),
        };
        assert_eq!(err.to_string(), "device did not answer 'ping' within 150ms");
    }
}
