//! HTTP transport to local device services.
//!
//! Handles:
//! - custom method tokens (`MOSIPDINFO`, `MOSIPDISC`, `RCAPTURE`, `STREAM`)
//! - per-call deadlines (short for liveness probes, caller-chosen for
//!   capture, header-only for live streams)
//! - mapping transport failures onto [`DeviceError`]

use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::{Client, Method, Response};
use tracing::{debug, trace};
use url::Url;

use crate::error::{DeviceError, DeviceResult};
use crate::transport::{
    BoxFuture, CAPTURE_ENDPOINT, CAPTURE_METHOD, DEVICE_DISCOVERY_ENDPOINT, DEVICE_INFO_ENDPOINT,
    DEVICE_INFO_METHOD, DISCOVERY_METHOD, DeviceStream, DeviceTransport, STREAM_ENDPOINT,
    STREAM_METHOD,
};

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Host the device services listen on.
    pub host: String,
    /// Deadline for device-info, discovery and capture calls.
    pub request_timeout: Duration,
    /// Deadline for liveness probes.
    pub probe_timeout: Duration,
    /// Deadline for a live stream to connect and answer with its status
    /// line. The body itself has no deadline.
    pub stream_connect_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            request_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(2),
            stream_connect_timeout: Duration::from_secs(5),
            user_agent: format!("biolink/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpTransportConfig {
    /// Default device service host.
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";

    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the stream open deadline.
    pub fn with_stream_connect_timeout(mut self, timeout: Duration) -> Self {
        self.stream_connect_timeout = timeout;
        self
    }

    /// Base URL without port, e.g. `http://127.0.0.1`.
    pub fn running_url(&self) -> String {
        format!("http://{}", self.host)
    }
}

/// [`DeviceTransport`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    stream_client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Creates a transport with the given configuration.
    pub fn new(config: HttpTransportConfig) -> DeviceResult<Self> {
        // Device services are always local; never route through a proxy.
        let client = Client::builder()
            .no_proxy()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| DeviceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let stream_client = Client::builder()
            .no_proxy()
            .connect_timeout(config.stream_connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| DeviceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            stream_client,
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Builds the URL of an endpoint on a port.
    pub fn endpoint_url(&self, port: u16, endpoint: &str) -> DeviceResult<Url> {
        let raw = format!("{}:{}/{}", self.config.running_url(), port, endpoint);
        Url::parse(&raw).map_err(|e| DeviceError::Network(format!("Invalid URL {}: {}", raw, e)))
    }

    async fn send(
        &self,
        client: &Client,
        method: &str,
        port: u16,
        endpoint: &str,
        body: Option<Vec<u8>>,
        timeout: Option<Duration>,
    ) -> DeviceResult<Response> {
        let url = self.endpoint_url(port, endpoint)?;
        let http_method = Method::from_bytes(method.as_bytes())
            .map_err(|_| DeviceError::Network(format!("Invalid HTTP method: {}", method)))?;

        let mut request = client.request(http_method, url.clone());
        if let Some(t) = timeout {
            request = request.timeout(t);
        }
        if let Some(b) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(b);
        }

        trace!(method = %method, url = %url, "Sending request");

        request
            .send()
            .await
            .map_err(|e| map_send_error(e, method, port, &url))
    }

    async fn text(&self, response: Response, operation: &str) -> DeviceResult<String> {
        let status = response.status();
        trace!(status = %status, "Received response");

        if status.is_success() {
            response.text().await.map_err(|e| {
                if e.is_timeout() {
                    DeviceError::timeout(operation)
                } else {
                    DeviceError::Network(format!("Failed to read response: {}", e))
                }
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DeviceError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn call(
        &self,
        method: &str,
        port: u16,
        endpoint: &str,
        body: Option<Vec<u8>>,
        timeout: Option<Duration>,
    ) -> DeviceResult<String> {
        let response = self
            .send(&self.client, method, port, endpoint, body, timeout)
            .await?;
        self.text(response, method).await
    }

    async fn open_stream(&self, port: u16, body: Vec<u8>) -> DeviceResult<Response> {
        let response = self
            .send(
                &self.stream_client,
                STREAM_METHOD,
                port,
                STREAM_ENDPOINT,
                Some(body),
                None,
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeviceError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn map_send_error(error: reqwest::Error, method: &str, port: u16, url: &Url) -> DeviceError {
    if error.is_timeout() {
        DeviceError::timeout(format!("{} {}", method, url))
    } else if error.is_connect() {
        DeviceError::unavailable(port, error.to_string())
    } else {
        DeviceError::Network(format!("Request failed: {}", error))
    }
}

impl DeviceTransport for HttpTransport {
    fn probe(&self, port: u16) -> BoxFuture<'_, DeviceResult<()>> {
        Box::pin(async move {
            // Any HTTP answer counts as alive; only transport failures do not.
            let response = self
                .send(
                    &self.client,
                    DEVICE_INFO_METHOD,
                    port,
                    DEVICE_INFO_ENDPOINT,
                    None,
                    Some(self.config.probe_timeout),
                )
                .await?;
            debug!(port, status = %response.status(), "Device service answered probe");
            Ok(())
        })
    }

    fn device_info(&self, port: u16) -> BoxFuture<'_, DeviceResult<String>> {
        Box::pin(self.call(DEVICE_INFO_METHOD, port, DEVICE_INFO_ENDPOINT, None, None))
    }

    fn discover(&self, port: u16, body: Vec<u8>) -> BoxFuture<'_, DeviceResult<String>> {
        Box::pin(async move {
            let response = self
                .send(
                    &self.client,
                    DISCOVERY_METHOD,
                    port,
                    DEVICE_DISCOVERY_ENDPOINT,
                    Some(body),
                    Some(self.config.probe_timeout),
                )
                .await?;
            self.text(response, DISCOVERY_METHOD).await
        })
    }

    fn capture(
        &self,
        port: u16,
        body: Vec<u8>,
        deadline: Duration,
    ) -> BoxFuture<'_, DeviceResult<String>> {
        Box::pin(self.call(
            CAPTURE_METHOD,
            port,
            CAPTURE_ENDPOINT,
            Some(body),
            Some(deadline),
        ))
    }

    fn stream(&self, port: u16, body: Vec<u8>) -> BoxFuture<'_, DeviceResult<DeviceStream>> {
        Box::pin(async move {
            let deadline = self.config.stream_connect_timeout;
            let response = tokio::time::timeout(deadline, self.open_stream(port, body))
                .await
                .map_err(|_| DeviceError::timeout(format!("{} on port {}", STREAM_METHOD, port)))??;

            debug!(port, "Stream opened");
            let chunks = response
                .bytes_stream()
                .map_err(|e| DeviceError::Network(format!("Stream interrupted: {}", e)));
            Ok(DeviceStream::new(chunks))
        })
    }
}
