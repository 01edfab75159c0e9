//! Manager configuration.
//!
//! Loadable from a TOML file; every field has a default so a partial file
//! (or none at all) works:
//!
//! ```toml
//! host = "127.0.0.1"
//! port_from = 4501
//! port_to = 4600
//! request_timeout_ms = 30000
//! probe_timeout_ms = 2000
//! miss_ttl_ms = 30000
//! environment = "Developer"
//! purpose = "Registration"
//! ```

use std::path::Path;
use std::time::Duration;

use biolink_adapters::{HttpTransportConfig, REGISTRATION_PURPOSE};
use serde::{Deserialize, Serialize};

use crate::error::{ManagerError, ManagerResult};

/// Device manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Host the device services listen on.
    pub host: String,

    /// First port of the scan range; `0` disables discovery.
    pub port_from: u16,

    /// Last port of the scan range (inclusive).
    pub port_to: u16,

    /// Deadline for device-info, discovery and capture calls, in
    /// milliseconds. Capture calls add the requested capture window on top.
    pub request_timeout_ms: u64,

    /// Deadline for liveness probes, in milliseconds.
    pub probe_timeout_ms: u64,

    /// How long a discovery that found nothing suppresses rescans, in
    /// milliseconds. `0` disables the miss window.
    pub miss_ttl_ms: u64,

    /// Environment tag sent with capture requests.
    pub environment: String,

    /// Purpose literal sent with capture requests.
    pub purpose: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            host: HttpTransportConfig::DEFAULT_HOST.to_string(),
            port_from: 4501,
            port_to: 4600,
            request_timeout_ms: 30_000,
            probe_timeout_ms: 2_000,
            miss_ttl_ms: 30_000,
            environment: "Developer".to_string(),
            purpose: REGISTRATION_PURPOSE.to_string(),
        }
    }
}

impl ManagerConfig {
    /// Loads configuration from a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> ManagerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text and validates it.
    pub fn from_toml_str(content: &str) -> ManagerResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the port range and timeouts.
    pub fn validate(&self) -> ManagerResult<()> {
        if self.request_timeout_ms == 0 {
            return Err(ManagerError::config("request_timeout_ms must be greater than 0"));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ManagerError::config("probe_timeout_ms must be greater than 0"));
        }
        if self.port_from != 0 && self.port_from > self.port_to {
            return Err(ManagerError::config(format!(
                "port_from ({}) is greater than port_to ({})",
                self.port_from, self.port_to
            )));
        }
        Ok(())
    }

    /// Builder: set the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Builder: set the scan range.
    pub fn with_port_range(mut self, from: u16, to: u16) -> Self {
        self.port_from = from;
        self.port_to = to;
        self
    }

    /// Builder: scan a single port.
    pub fn with_port(self, port: u16) -> Self {
        self.with_port_range(port, port)
    }

    /// Builder: set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = millis(timeout);
        self
    }

    /// Builder: set the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = millis(timeout);
        self
    }

    /// Builder: set the miss window.
    pub fn with_miss_ttl(mut self, ttl: Duration) -> Self {
        self.miss_ttl_ms = millis(ttl);
        self
    }

    /// Builder: set the environment tag.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Returns true if discovery is enabled.
    pub fn discovery_enabled(&self) -> bool {
        self.port_from != 0
    }

    /// Ports to scan, in order. Empty when discovery is disabled.
    pub fn ports(&self) -> Vec<u16> {
        if !self.discovery_enabled() {
            return Vec::new();
        }
        (self.port_from..=self.port_to).collect()
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Probe timeout as a duration.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Miss window as a duration.
    pub fn miss_ttl(&self) -> Duration {
        Duration::from_millis(self.miss_ttl_ms)
    }

    /// Base URL of the device services, without port.
    pub fn running_url(&self) -> String {
        format!("http://{}", self.host)
    }

    /// Builds the HTTP transport configuration.
    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig::default()
            .with_host(self.host.clone())
            .with_request_timeout(self.request_timeout())
            .with_probe_timeout(self.probe_timeout())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
