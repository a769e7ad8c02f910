// MIT License

use std::time::Duration;

/// Default INDI server port.
pub const DEFAULT_PORT: u16 = 7624;

/// Configuration for connecting to an INDI gateway.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway host name or IP address
    pub host: String,
    /// Gateway TCP port (default: 7624)
    pub port: u16,
    /// Timeout for the initial TCP connect (default: 5s)
    pub connect_timeout: Duration,
    /// Base delay for exponential reconnect backoff (default: 2000ms)
    pub base_reconnect_delay: Duration,
    /// Maximum automatic reconnect attempts before giving up (default: 5)
    pub max_reconnect_attempts: u32,
    /// Capacity of the broadcast event channel (default: 256)
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            base_reconnect_delay: Duration::from_millis(2000),
            max_reconnect_attempts: 5,
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// The `host:port` address string used by the TCP connector.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn base_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.base_reconnect_delay = delay;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
