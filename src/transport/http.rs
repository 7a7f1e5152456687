//! HTTP transport to the device's command endpoint.
//!
//! Each command is sent verbatim as the path of a GET request against the
//! configured base URL, e.g. `http://hardware:5001/set_config=focus:800`.

use super::{Transport, TransportError};
use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Builder for [`HttpTransport`].
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use hardware_gateway::transport::HttpTransportBuilder;
///
/// let transport = HttpTransportBuilder::new("http://hardware:5001")
///     .with_connect_timeout(Duration::from_millis(500))
///     .build()?;
/// # Ok::<(), hardware_gateway::error::GatewayError>(())
/// ```
pub struct HttpTransportBuilder {
    base_url: String,
    connect_timeout: Duration,
}

impl HttpTransportBuilder {
    /// Start from a base URL. A trailing `/` is added when missing.
    ///
    /// Default configuration:
    /// * connect_timeout: 1 second
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(1),
        }
    }

    /// Set the TCP connect timeout.
    ///
    /// Default: 1 second
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    /// Returns [`GatewayError::Http`] if the HTTP client cannot be created.
    pub fn build(self) -> GatewayResult<HttpTransport> {
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(GatewayError::Http)?;

        let mut base_url = self.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(HttpTransport { client, base_url })
    }
}

/// [`Transport`] that talks to the device over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Transport with default settings for `base_url`.
    ///
    /// # Errors
    /// Returns [`GatewayError::Http`] if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> GatewayResult<Self> {
        HttpTransportBuilder::new(base_url).build()
    }

    /// Base URL commands are appended to. Always ends in `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for `command`.
    pub fn url_for(&self, command: &str) -> String {
        format!("{}{}", self.base_url, command)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, command: &str, deadline: Duration) -> Result<String, TransportError> {
        let url = self.url_for(command);
        debug!(%url, deadline_ms = deadline.as_millis() as u64, "GET");

        let classify = |source: reqwest::Error| {
            if source.is_timeout() {
                TransportError::Timeout {
                    command: command.to_string(),
                    deadline,
                }
            } else if source.is_connect() {
                TransportError::Unavailable(format!("'{command}': {source}"))
            } else {
                TransportError::Http {
                    command: command.to_string(),
                    source,
                }
            }
        };

        let response = self
            .client
            .get(&url)
            .timeout(deadline)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = response.text().await.map_err(classify)?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(TransportError::Rejected {
                command: command.to_string(),
                status: status.as_u16(),
                body,
            })
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let transport = HttpTransport::new("http://hardware:5001").unwrap();
        assert_eq!(transport.base_url(), "http://hardware:5001/");
        assert_eq!(
            transport.url_for("set_config=focus:800"),
            "http://hardware:5001/set_config=focus:800"
        );
    }

    #[test]
    fn test_existing_slash_kept() {
        let transport = HttpTransportBuilder::new("http://hardware:5001/")
            .with_connect_timeout(Duration::from_millis(250))
            .build()
            .unwrap();
        assert_eq!(transport.url_for("ping"), "http://hardware:5001/ping");
        assert_eq!(transport.name(), "http");
    }

    #[tokio::test]
    async fn test_unreachable_device_is_transient() {
        // Port 9 on loopback is discard; nothing listens there in CI.
        let transport = HttpTransport::new("http://127.0.0.1:9").unwrap();
        let err = transport
            .send("ping", Duration::from_millis(150))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)), "{err:?}");
        assert!(err.is_transient());
    }
}
