//! Upstream client configuration

use std::time::Duration;

use crate::error::{Error, Result};

/// Default upstream address (the game's local status socket)
pub const DEFAULT_UPSTREAM_ADDRESS: &str = "127.0.0.1:48998";

/// Environment variable overriding the upstream address
pub const UPSTREAM_ADDRESS_ENV: &str = "AT_STATUS_SOCKET";

/// Fixed delay between a connection loss and the next attempt
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1500);

/// Minimum spacing of the periodic message count log
pub const REPORT_INTERVAL: Duration = Duration::from_millis(2000);

/// Upstream client configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// WebSocket URL of the upstream
    pub url: String,

    /// Delay before reconnecting (no growth, no jitter, unlimited retries)
    pub reconnect_delay: Duration,

    /// Minimum interval between message count reports
    pub report_interval: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: upstream_url(DEFAULT_UPSTREAM_ADDRESS),
            reconnect_delay: RECONNECT_DELAY,
            report_interval: REPORT_INTERVAL,
        }
    }
}

/// Build the status socket URL for a `host:port` address
pub fn upstream_url(address: &str) -> String {
    format!("ws://{}/websocket", address)
}

impl UpstreamConfig {
    /// Create a config for a `host:port` address
    pub fn from_address(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() || address.contains('/') {
            return Err(Error::Config(format!(
                "upstream address must be host:port, got '{}'",
                address
            )));
        }

        Ok(Self {
            url: upstream_url(address),
            ..Default::default()
        })
    }

    /// Create a config with an explicit URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the message count report interval
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }
}
